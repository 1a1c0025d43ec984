//! Perceptual quality measurement.
//!
//! The quality-seeking encoders accept a candidate only when its SSIM
//! against the source stays above their threshold; this module supplies the
//! metric and the decode/grayscale/resample plumbing in front of it.

mod kernel;
pub mod prepare;
mod ssim;

pub use kernel::{GAUSSIAN_KERNEL, WINDOW_SIZE};
pub use ssim::{ssim, ssim_with_alpha};
