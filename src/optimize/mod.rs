//! Encoder orchestration.
//!
//! Every external encoder is wrapped in an adapter implementing
//! [`ImageOptimizer`]. A request's source image is sniffed, the catalog is
//! filtered down to the adapters that can act on it, and the survivors race
//! in a worker pool; the smallest produced candidate (or the original) is
//! served.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::ImageFormat;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

pub mod cwebp;
pub mod mozjpeg;
pub mod optipng;
mod pool;
mod quality;
mod util;

pub use quality::{AutoQuality, QualityEncoder};
pub use util::{remove_quiet, temp_filename};

use crate::error::OptimizeError;

pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_WEBP: &str = "image/webp";

/// Tag used for the pass-through pseudo-candidate.
pub const ORIGINAL: &str = "original";

/// How much of the file the MIME sniffer looks at.
const SNIFF_LEN: usize = 512;

/// A produced (or pass-through) image under consideration for the response.
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    /// Human-readable tag of the encoder that produced this candidate,
    /// e.g. `cwebp-lossless` or `mozjpeg-lossy[image/png]`.
    pub optimizer: String,
    pub path: PathBuf,
    pub mime_type: String,
    pub size: u64,
}

/// One optimization request as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct OptimizeParams {
    /// Accept list with `;`-parameters already stripped.
    pub accepted_types: Vec<String>,
    pub source_path: PathBuf,
    /// 2x retina asset; comparisons run at 1x.
    pub hidpi: bool,
}

/// An encoder adapter: eligibility rules plus the invocation itself.
///
/// `optimize` returning `Ok(None)` means the adapter declined (precheck
/// failed, or no quality met its threshold); that is not an error.
#[async_trait]
pub trait ImageOptimizer: Send + Sync {
    fn can_optimize(&self, mime_type: &str, accepted_types: &[String]) -> bool;

    async fn optimize(
        &self,
        source: &Path,
        hidpi: bool,
    ) -> Result<Option<OptimizedImage>, OptimizeError>;
}

/// The full encoder catalog with production thresholds.
pub fn default_optimizers() -> Vec<Arc<dyn ImageOptimizer>> {
    vec![
        Arc::new(cwebp::WebpLossless::new(vec!["-z".into(), "9".into()])),
        Arc::new(AutoQuality::new(cwebp::WebpQuality::from_png(), 0.998)),
        Arc::new(AutoQuality::new(cwebp::WebpQuality::from_jpeg(), 0.995)),
        Arc::new(optipng::Optipng::new(vec!["-strip".into(), "all".into()])),
        Arc::new(mozjpeg::Jpegtran::new(vec![
            "-copy".into(),
            "none".into(),
            "-optimize".into(),
        ])),
        Arc::new(AutoQuality::new(mozjpeg::MozjpegQuality::from_png(), 0.997)),
        Arc::new(AutoQuality::new(mozjpeg::MozjpegQuality::from_jpeg(), 0.994)),
    ]
}

/// Sniff a MIME type from the leading bytes of a file.
///
/// Only PNG and JPEG can trigger adapters; everything else is reported so
/// the proxy can pass it through untouched.
pub fn detect_mime(header: &[u8]) -> &'static str {
    match image::guess_format(header) {
        Ok(ImageFormat::Png) => MIME_PNG,
        Ok(ImageFormat::Jpeg) => MIME_JPEG,
        Ok(ImageFormat::WebP) => MIME_WEBP,
        _ => "application/octet-stream",
    }
}

/// True when at least one adapter in the catalog can act on this content
/// type for this client.
pub fn can_optimize_any(
    optimizers: &[Arc<dyn ImageOptimizer>],
    mime_type: &str,
    accepted_types: &[String],
) -> bool {
    optimizers
        .iter()
        .any(|opt| opt.can_optimize(mime_type, accepted_types))
}

/// Optimize one source image.
///
/// Sniffs and stats the source, filters the catalog, and races the eligible
/// adapters. `Ok(None)` means nothing was eligible and the caller should
/// serve its original response unchanged. `Ok(Some(_))` surrenders the
/// chosen candidate's file to the caller; all other produced files have
/// been removed.
pub async fn optimize(
    optimizers: &[Arc<dyn ImageOptimizer>],
    params: &OptimizeParams,
    cancel: CancellationToken,
) -> Result<Option<OptimizedImage>, OptimizeError> {
    let mut file = tokio::fs::File::open(&params.source_path)
        .await
        .map_err(OptimizeError::SourceUnreadable)?;
    let mut header = [0u8; SNIFF_LEN];
    let read = file
        .read(&mut header)
        .await
        .map_err(OptimizeError::SourceUnreadable)?;
    let meta = file
        .metadata()
        .await
        .map_err(OptimizeError::SourceUnreadable)?;

    let mime_type = detect_mime(&header[..read]);
    tracing::debug!(mime_type, size = meta.len(), "detected source type");

    let eligible: Vec<Arc<dyn ImageOptimizer>> = optimizers
        .iter()
        .filter(|opt| opt.can_optimize(mime_type, &params.accepted_types))
        .cloned()
        .collect();
    if eligible.is_empty() {
        return Ok(None);
    }

    let original = OptimizedImage {
        optimizer: ORIGINAL.to_string(),
        path: params.source_path.clone(),
        mime_type: mime_type.to_string(),
        size: meta.len(),
    };

    pool::dispatch(original, eligible, params, cancel)
        .await
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    const JPEG_MAGIC: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn detects_png() {
        assert_eq!(detect_mime(PNG_MAGIC), MIME_PNG);
    }

    #[test]
    fn detects_jpeg() {
        assert_eq!(detect_mime(JPEG_MAGIC), MIME_JPEG);
    }

    #[test]
    fn unknown_bytes_are_not_images() {
        assert_eq!(detect_mime(b"<!doctype html>"), "application/octet-stream");
        assert_eq!(detect_mime(&[]), "application/octet-stream");
    }

    #[test]
    fn default_catalog_covers_both_source_formats() {
        let optimizers = default_optimizers();
        let webp_accept = vec![MIME_WEBP.to_string()];
        let any_accept = vec!["*/*".to_string()];

        assert!(can_optimize_any(&optimizers, MIME_PNG, &webp_accept));
        assert!(can_optimize_any(&optimizers, MIME_JPEG, &any_accept));
        assert!(!can_optimize_any(&optimizers, MIME_WEBP, &any_accept));
        assert!(!can_optimize_any(&optimizers, "text/html", &any_accept));
    }

    #[tokio::test]
    async fn missing_source_is_unreadable() {
        let params = OptimizeParams {
            accepted_types: vec!["*/*".to_string()],
            source_path: PathBuf::from("/nonexistent/image.png"),
            hidpi: false,
        };
        let err = optimize(&default_optimizers(), &params, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizeError::SourceUnreadable(_)));
    }

    #[tokio::test]
    async fn nothing_eligible_returns_none() {
        // A real PNG source, but the client only accepts text.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 4))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();

        let params = OptimizeParams {
            accepted_types: vec!["text/html".to_string()],
            source_path: path,
            hidpi: false,
        };
        let chosen = optimize(&default_optimizers(), &params, CancellationToken::new())
            .await
            .unwrap();
        assert!(chosen.is_none());
    }
}
