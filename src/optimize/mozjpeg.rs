//! JPEG adapters built on the mozjpeg toolchain (`jpegtran`, `cjpeg`).
//!
//! Both tools frame their output on stdout, so the adapters pre-open the
//! output file and hand it to the child as its stdout.

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;

use crate::error::OptimizeError;
use crate::metric::prepare;
use crate::optimize::{
    util, ImageOptimizer, OptimizedImage, QualityEncoder, MIME_JPEG, MIME_PNG,
};

/// Accept-list entries that allow serving a JPEG response.
const JPEG_TARGETS: &[&str] = &[MIME_JPEG, "image/*", "*/*"];

/// `jpegtran -copy none -optimize`: lossless JPEG recompression.
pub struct Jpegtran {
    args: Vec<String>,
}

impl Jpegtran {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }
}

#[async_trait]
impl ImageOptimizer for Jpegtran {
    fn can_optimize(&self, mime_type: &str, accepted_types: &[String]) -> bool {
        mime_type == MIME_JPEG && util::accepts_any(accepted_types, JPEG_TARGETS)
    }

    async fn optimize(
        &self,
        source: &Path,
        _hidpi: bool,
    ) -> Result<Option<OptimizedImage>, OptimizeError> {
        let output = util::temp_filename(source);
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push(source.into());

        util::run_tool("jpegtran", args, Some(&output)).await?;
        util::stat_output("jpegtran".to_string(), output, MIME_JPEG)
            .await
            .map(Some)
    }
}

/// `cjpeg -optimize -quality N`: quality-parameterized JPEG encoding.
///
/// mozjpeg's `cjpeg` also reads PNG input, which is what makes the
/// PNG-source variant possible.
pub struct MozjpegQuality {
    source_mime: &'static str,
}

impl MozjpegQuality {
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
            "-optimize".into(),
            "-quality".into(),
            quality.to_string().into(),
            source.into(),
        ];

        util::run_tool("cjpeg", args, Some(&output)).await?;
        util::stat_output(
            format!("mozjpeg-lossy[{}]", self.source_mime),
            output,
            MIME_JPEG,
        )
        .await
    }
}

#[async_trait]
impl QualityEncoder for MozjpegQuality {
    fn can_optimize(&self, mime_type: &str, accepted_types: &[String]) -> bool {
        mime_type == self.source_mime && util::accepts_any(accepted_types, JPEG_TARGETS)
    }

    async fn precheck(&self, source: &Path) -> Result<bool, OptimizeError> {
        if self.source_mime != MIME_PNG {
            return Ok(true);
        }
        // JPEG has no alpha channel; a PNG with any transparency cannot be
        // substituted.
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
        // A JPEG source is decoded directly; a PNG source is compared
        // through a q=100 intermediate so both sides share the JPEG color
        // pipeline.
        let reference = if self.source_mime == MIME_PNG {
            let reference_file = self.encode_at(source, 100).await?;
            let decoded = prepare::decode(&reference_file.path);
            util::remove_quiet(&reference_file.path).await;
            decoded?
        } else {
            prepare::decode(source)?
        };

        let candidate_img = prepare::decode(&candidate.path)?;
        Ok(prepare::score(reference, candidate_img, hidpi, false))
    }
}
