//! The proxying handler: fetch from the upstream, optimize when the
//! content and the client's Accept list allow it, and serve the smallest
//! representation.

use std::path::Path;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::Response,
};

use crate::api::headers::{forwardable_headers, parse_accepted_types};
use crate::error::ApiError;
use crate::optimize::{self, OptimizeParams, ORIGINAL};
use crate::server::AppState;

/// Fallback handler: every request that is not an internal route is
/// proxied to `BASE_URL` + path.
pub async fn handle_proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, ApiError> {
    let accepted_types = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(parse_accepted_types)
        .unwrap_or_default();

    // `name@2x.png` marks a 2x retina asset; quality comparison then runs
    // at 1x to reflect on-screen appearance.
    let hidpi = uri.path().contains("@2x.");

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let upstream_url = format!("{}{}", state.config.base_url, path_and_query);
    tracing::info!(url = %upstream_url, hidpi, "proxying request");

    let upstream = state
        .http
        .get(&upstream_url)
        .headers(forwardable_headers(&headers))
        .send()
        .await?;

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let content_type = upstream_headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| match v.split_once(';') {
            Some((media_type, _params)) => media_type.trim(),
            None => v.trim(),
        })
        .unwrap_or_default()
        .to_string();

    let body = upstream.bytes().await?;

    if !status.is_success()
        || !optimize::can_optimize_any(&state.optimizers, &content_type, &accepted_types)
    {
        return Ok(passthrough(status, &upstream_headers, body));
    }

    // Spool the upstream body so the encoder tools can read it.
    let source_path = optimize::temp_filename(Path::new(uri.path()));
    tokio::fs::write(&source_path, &body).await?;

    // Child token: cancelled along with server shutdown, and by the drop
    // guard when the client goes away mid-optimization.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let params = OptimizeParams {
        accepted_types,
        source_path: source_path.clone(),
        hidpi,
    };
    let chosen = match optimize::optimize(&state.optimizers, &params, cancel).await {
        Ok(Some(chosen)) => chosen,
        Ok(None) => {
            // The content-type header promised an image the sniffer did not
            // find; serve the upstream response unchanged.
            optimize::remove_quiet(&source_path).await;
            return Ok(passthrough(status, &upstream_headers, body));
        }
        Err(e) => {
            optimize::remove_quiet(&source_path).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        optimizer = %chosen.optimizer,
        mime_type = %chosen.mime_type,
        size = chosen.size,
        original_size = body.len(),
        "serving candidate"
    );

    let response_body = tokio::fs::read(&chosen.path).await?;
    if chosen.optimizer != ORIGINAL {
        optimize::remove_quiet(&chosen.path).await;
    }
    optimize::remove_quiet(&source_path).await;

    let mut response = Response::new(Body::from(response_body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        chosen
            .mime_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, header::HeaderValue::from(chosen.size));
    Ok(response)
}

/// Re-serve an upstream response unchanged (minus hop-by-hop headers).
fn passthrough(status: StatusCode, upstream_headers: &HeaderMap, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    for (name, value) in upstream_headers {
        if name == header::CONNECTION
            || name == header::TRANSFER_ENCODING
            || name == header::CONTENT_LENGTH
        {
            continue;
        }
        response.headers_mut().append(name, value.clone());
    }
    response
}
