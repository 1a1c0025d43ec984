//! Decode and normalize images ahead of SSIM comparison.
//!
//! Encoder output lands in temp files that keep the source basename, so the
//! extension says nothing about the actual format; everything here decodes
//! by sniffing the file content.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, GrayImage, ImageReader, Luma};

use crate::error::OptimizeError;
use crate::metric::{ssim, ssim_with_alpha};

/// Decode an image file, guessing the format from its leading bytes.
pub fn decode(path: &Path) -> Result<DynamicImage, OptimizeError> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(img)
}

/// Score a candidate against its reference.
///
/// Both sides are resampled to 1x first when `hidpi` is set (the comparison
/// should reflect on-screen appearance of a 2x asset), then projected to
/// luma. With `with_alpha`, windows that the reference marks fully
/// transparent are excluded from the score.
pub fn score(
    reference: DynamicImage,
    candidate: DynamicImage,
    hidpi: bool,
    with_alpha: bool,
) -> f64 {
    let (reference, candidate) = if hidpi {
        (halve(&reference), halve(&candidate))
    } else {
        (reference, candidate)
    };

    let gray1 = reference.to_luma8();
    let gray2 = candidate.to_luma8();

    if with_alpha {
        let alpha = alpha_plane(&reference);
        ssim_with_alpha(&gray1, &gray2, &alpha)
    } else {
        ssim(&gray1, &gray2)
    }
}

/// Lanczos-downsample to half width, height proportional.
pub fn halve(img: &DynamicImage) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let new_width = (width / 2).max(1);
    let new_height = ((f64::from(height) * f64::from(new_width) / f64::from(width)).round()
        as u32)
        .max(1);
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// Extract the 8-bit alpha plane (16-bit alpha is downsampled).
pub fn alpha_plane(img: &DynamicImage) -> GrayImage {
    let rgba = img.to_rgba8();
    let mut plane = GrayImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        plane.put_pixel(x, y, Luma([pixel.0[3]]));
    }
    plane
}

/// True when any pixel is less than fully opaque on the 16-bit alpha scale.
pub fn has_transparency(img: &DynamicImage) -> bool {
    if !img.color().has_alpha() {
        return false;
    }
    let rgba = img.to_rgba16();
    rgba.pixels().any(|p| p.0[3] < u16::MAX)
}
