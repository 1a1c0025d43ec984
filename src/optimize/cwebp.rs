//! WebP adapters built on the `cwebp` tool.
//!
//! Two shapes: a lossless transcode for PNG sources, and a quality-driven
//! encoder (wrapped in [`AutoQuality`](super::AutoQuality)) for PNG and
//! JPEG sources. WebP candidates are only offered to clients whose Accept
//! list names `image/webp` explicitly.

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;

use crate::error::OptimizeError;
use crate::metric::prepare;
use crate::optimize::{
    util, ImageOptimizer, OptimizedImage, QualityEncoder, MIME_JPEG, MIME_PNG, MIME_WEBP,
};

/// `cwebp -lossless`: PNG in, losslessly recompressed WebP out.
pub struct WebpLossless {
    extra_args: Vec<String>,
}

impl WebpLossless {
    pub fn new(extra_args: Vec<String>) -> Self {
        Self { extra_args }
    }
}

#[async_trait]
impl ImageOptimizer for WebpLossless {
    fn can_optimize(&self, mime_type: &str, accepted_types: &[String]) -> bool {
        mime_type == MIME_PNG && util::accepts_any(accepted_types, &[MIME_WEBP])
    }

    async fn optimize(
        &self,
        source: &Path,
        _hidpi: bool,
    ) -> Result<Option<OptimizedImage>, OptimizeError> {
        let output = util::temp_filename(source);
        let mut args: Vec<OsString> = vec![
            source.into(),
            "-o".into(),
            output.clone().into(),
            "-lossless".into(),
        ];
        args.extend(self.extra_args.iter().map(OsString::from));

        util::run_tool("cwebp", args, None).await?;
        util::stat_output("cwebp-lossless".to_string(), output, MIME_WEBP)
            .await
            .map(Some)
    }
}

/// `cwebp -q N`: quality-parameterized WebP encoding.
pub struct WebpQuality {
    source_mime: &'static str,
}

impl WebpQuality {
    pub fn from_png() -> Self {
        Self {
            source_mime: MIME_PNG,
        }
    }

    pub fn from_jpeg() -> Self {
        Self {
            source_mime: MIME_JPEG,
        }
    }

    async fn encode_at(
        &self,
        source: &Path,
        quality: u8,
    ) -> Result<OptimizedImage, OptimizeError> {
        let output = util::temp_filename(source);
        let args: Vec<OsString> = vec![
            "-q".into(),
            quality.to_string().into(),
            "-o".into(),
            output.clone().into(),
            source.into(),
        ];

        util::run_tool("cwebp", args, None).await?;
        util::stat_output(
            format!("cwebp-lossy[{}]", self.source_mime),
            output,
            MIME_WEBP,
        )
        .await
    }
}

#[async_trait]
impl QualityEncoder for WebpQuality {
    fn can_optimize(&self, mime_type: &str, accepted_types: &[String]) -> bool {
        mime_type == self.source_mime && util::accepts_any(accepted_types, &[MIME_WEBP])
    }

    async fn precheck(&self, source: &Path) -> Result<bool, OptimizeError> {
        if self.source_mime != MIME_PNG {
            return Ok(true);
        }
        // Lossy WebP flattens partial transparency; leave such sources to
        // the lossless adapter.
        let img = prepare::decode(source)?;
        Ok(!prepare::has_transparency(&img))
    }

    async fn encode(
        &self,
        source: &Path,
        quality: u8,
    ) -> Result<OptimizedImage, OptimizeError> {
        self.encode_at(source, quality).await
    }

    async fn compare(
        &self,
        source: &Path,
        candidate: &OptimizedImage,
        hidpi: bool,
    ) -> Result<f64, OptimizeError> {
        // The reference is the source re-encoded at q=100, so both sides of
        // the comparison go through the same WebP color pipeline.
        let reference_file = self.encode_at(source, 100).await?;
        let decoded = prepare::decode(&reference_file.path);
        util::remove_quiet(&reference_file.path).await;
        let reference = decoded?;

        let candidate_img = prepare::decode(&candidate.path)?;
        Ok(prepare::score(reference, candidate_img, hidpi, true))
    }
}
