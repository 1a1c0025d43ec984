//! PNG recompression via `optipng`.

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;

use crate::error::OptimizeError;
use crate::optimize::{util, ImageOptimizer, OptimizedImage, MIME_PNG};

/// Accept-list entries that allow serving a PNG response.
const PNG_TARGETS: &[&str] = &[MIME_PNG, "image/*", "*/*"];

/// `optipng -strip all`: lossless PNG recompression, metadata stripped.
pub struct Optipng {
    extra_args: Vec<String>,
}

impl Optipng {
    pub fn new(extra_args: Vec<String>) -> Self {
        Self { extra_args }
    }
}

#[async_trait]
impl ImageOptimizer for Optipng {
    fn can_optimize(&self, mime_type: &str, accepted_types: &[String]) -> bool {
        mime_type == MIME_PNG && util::accepts_any(accepted_types, PNG_TARGETS)
    }

    async fn optimize(
        &self,
        source: &Path,
        _hidpi: bool,
    ) -> Result<Option<OptimizedImage>, OptimizeError> {
        let output = util::temp_filename(source);
        let mut args: Vec<OsString> =
            vec![source.into(), "-out".into(), output.clone().into()];
        args.extend(self.extra_args.iter().map(OsString::from));

        util::run_tool("optipng", args, None).await?;
        util::stat_output("optipng".to_string(), output, MIME_PNG)
            .await
            .map(Some)
    }
}
