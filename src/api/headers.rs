//! Header utilities for the proxy.

use axum::http::{header, HeaderMap};

/// Parse an Accept header into its media types.
///
/// Parameters after `;` (quality weights and the like) are stripped and
/// items are trimmed, so `"image/webp, image/*;q=0.8"` becomes
/// `["image/webp", "image/*"]`. No wildcard expansion happens here; the
/// adapters match entries literally.
pub fn parse_accepted_types(accept: &str) -> Vec<String> {
    accept
        .split(',')
        .map(|part| {
            let media_type = match part.split_once(';') {
                Some((media_type, _params)) => media_type,
                None => part,
            };
            media_type.trim().to_string()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Copy the client's request headers for the upstream fetch.
///
/// `Host` belongs to the upstream's own name, `Connection` is hop-by-hop,
/// and `Accept-Encoding` is dropped so the upstream sends identity bytes —
/// the sniffer and the encoder tools need the actual image, not a gzip
/// stream.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    forwarded.remove(header::HOST);
    forwarded.remove(header::CONNECTION);
    forwarded.remove(header::ACCEPT_ENCODING);
    forwarded
}
