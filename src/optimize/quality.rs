//! Quality search: find the smallest encoder quality whose output still
//! meets a perceptual threshold.

use std::path::Path;

use async_trait::async_trait;

use crate::error::OptimizeError;
use crate::optimize::{util, ImageOptimizer, OptimizedImage};

/// An encoder that can be driven at any integer quality in `0..=100`.
#[async_trait]
pub trait QualityEncoder: Send + Sync {
    fn can_optimize(&self, mime_type: &str, accepted_types: &[String]) -> bool;

    /// Cheap test before any encode runs; `false` declines the source
    /// (e.g. a transparent PNG offered to a JPEG target).
    async fn precheck(&self, source: &Path) -> Result<bool, OptimizeError>;

    /// Encode the source at the given quality into a fresh temp file.
    async fn encode(&self, source: &Path, quality: u8)
        -> Result<OptimizedImage, OptimizeError>;

    /// Measure the candidate's perceptual similarity to the source.
    async fn compare(
        &self,
        source: &Path,
        candidate: &OptimizedImage,
        hidpi: bool,
    ) -> Result<f64, OptimizeError>;
}

/// Wraps a [`QualityEncoder`] in a binary search over quality.
///
/// Returns the candidate with the lowest quality still scoring at least
/// `min_ssim`, or `None` when no quality does. At most 7 encode+compare
/// cycles run per source.
pub struct AutoQuality<E> {
    encoder: E,
    min_ssim: f64,
}

impl<E> AutoQuality<E> {
    pub fn new(encoder: E, min_ssim: f64) -> Self {
        debug_assert!(min_ssim > 0.0 && min_ssim < 1.0);
        Self { encoder, min_ssim }
    }
}

#[async_trait]
impl<E: QualityEncoder> ImageOptimizer for AutoQuality<E> {
    fn can_optimize(&self, mime_type: &str, accepted_types: &[String]) -> bool {
        self.encoder.can_optimize(mime_type, accepted_types)
    }

    async fn optimize(
        &self,
        source: &Path,
        hidpi: bool,
    ) -> Result<Option<OptimizedImage>, OptimizeError> {
        if !self.encoder.precheck(source).await? {
            tracing::debug!(source = %source.display(), "precheck declined source");
            return Ok(None);
        }

        let mut best: Option<OptimizedImage> = None;
        let mut lo: i32 = 0;
        let mut hi: i32 = 100;

        while hi - lo >= 0 {
            let quality = ((lo + hi) / 2) as u8;
            let candidate = self.encoder.encode(source, quality).await?;
            let score = self.encoder.compare(source, &candidate, hidpi).await?;
            tracing::debug!(quality, score, size = candidate.size, "quality probe");

            // A NaN score (degenerate comparison) fails the threshold.
            if score >= self.min_ssim {
                hi = i32::from(quality) - 1;
                if let Some(previous) = best.replace(candidate) {
                    util::remove_quiet(&previous.path).await;
                }
            } else {
                lo = i32::from(quality) + 1;
                util::remove_quiet(&candidate.path).await;
            }
        }

        Ok(best)
    }
}
