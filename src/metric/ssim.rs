//! Structural similarity (SSIM) over a sliding Gaussian window.
//!
//! Both entry points take 8-bit single-channel planes of equal dimensions
//! and return a single score, 1.0 meaning identical. The alpha-masked
//! variant skips windows that are fully transparent in the mask, so that
//! invisible pixels of a transparent source cannot drag the score down.
//!
//! Images smaller than one window produce zero windows and the score is
//! NaN; callers must treat NaN as worst quality.

use image::GrayImage;

use super::kernel::{GAUSSIAN_KERNEL, WINDOW_SIZE};

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const L: f64 = 255.0;
const C1: f64 = (K1 * L) * (K1 * L);
const C2: f64 = (K2 * L) * (K2 * L);

/// Mean SSIM of two grayscale planes.
pub fn ssim(img1: &GrayImage, img2: &GrayImage) -> f64 {
    windowed_ssim(img1, img2, None)
}

/// Mean SSIM of two grayscale planes, ignoring windows whose 121 mask
/// samples are all zero (fully transparent).
///
/// Returns NaN when every window is discarded.
pub fn ssim_with_alpha(img1: &GrayImage, img2: &GrayImage, alpha: &GrayImage) -> f64 {
    windowed_ssim(img1, img2, Some(alpha))
}

fn windowed_ssim(img1: &GrayImage, img2: &GrayImage, alpha: Option<&GrayImage>) -> f64 {
    assert_eq!(
        img1.dimensions(),
        img2.dimensions(),
        "ssim inputs must have equal dimensions"
    );
    if let Some(alpha) = alpha {
        assert_eq!(
            img1.dimensions(),
            alpha.dimensions(),
            "alpha mask must match image dimensions"
        );
    }

    let width = img1.width() as usize;
    let height = img1.height() as usize;
    let p1 = img1.as_raw();
    let p2 = img2.as_raw();

    let mut sum = 0.0;
    let mut num_windows = 0u32;
    let mut num_transparent = 0u32;

    // Window anchors run to dim - WINDOW_SIZE exclusive; anything 11 pixels
    // or narrower yields no windows at all.
    for y in 0..height.saturating_sub(WINDOW_SIZE) {
        for x in 0..width.saturating_sub(WINDOW_SIZE) {
            if let Some(alpha) = alpha {
                if fully_transparent(alpha.as_raw(), width, x, y) {
                    num_transparent += 1;
                    continue;
                }
            }
            sum += window_score(p1, p2, width, x, y);
            num_windows += 1;
        }
    }

    tracing::trace!(
        windows = num_windows,
        transparent = num_transparent,
        "ssim windows scored"
    );

    sum / f64::from(num_windows)
}

fn fully_transparent(alpha: &[u8], stride: usize, x: usize, y: usize) -> bool {
    for wy in 0..WINDOW_SIZE {
        let row = (y + wy) * stride + x;
        if alpha[row..row + WINDOW_SIZE].iter().any(|&a| a > 0) {
            return false;
        }
    }
    true
}

fn window_score(p1: &[u8], p2: &[u8], stride: usize, x: usize, y: usize) -> f64 {
    let mean1 = weighted_mean(p1, stride, x, y);
    let mean2 = weighted_mean(p2, stride, x, y);

    let stdev1 = weighted_stdev(p1, stride, x, y, mean1);
    let stdev2 = weighted_stdev(p2, stride, x, y, mean2);

    let covar = weighted_covariance(p1, p2, stride, x, y, mean1, mean2);

    let a = (2.0 * mean1 * mean2 + C1) * (2.0 * covar + C2);
    let b = (mean1 * mean1 + mean2 * mean2 + C1) * (stdev1 * stdev1 + stdev2 * stdev2 + C2);

    a / b
}

fn weighted_mean(p: &[u8], stride: usize, x: usize, y: usize) -> f64 {
    let mut sum = 0.0;
    for wy in 0..WINDOW_SIZE {
        let row = (y + wy) * stride + x;
        for wx in 0..WINDOW_SIZE {
            sum += GAUSSIAN_KERNEL[wy][wx] * f64::from(p[row + wx]);
        }
    }
    sum
}

// Returns the square root of the weighted variance; window_score squares it
// again before use. The shipped min-SSIM thresholds are calibrated against
// exactly this arithmetic, so it must not be "corrected".
fn weighted_stdev(p: &[u8], stride: usize, x: usize, y: usize, mean: f64) -> f64 {
    let mut sum = 0.0;
    for wy in 0..WINDOW_SIZE {
        let row = (y + wy) * stride + x;
        for wx in 0..WINDOW_SIZE {
            let val = f64::from(p[row + wx]) - mean;
            sum += GAUSSIAN_KERNEL[wy][wx] * (val * val);
        }
    }
    sum.powf(0.5)
}

fn weighted_covariance(
    p1: &[u8],
    p2: &[u8],
    stride: usize,
    x: usize,
    y: usize,
    mean1: f64,
    mean2: f64,
) -> f64 {
    let mut sum = 0.0;
    for wy in 0..WINDOW_SIZE {
        let row = (y + wy) * stride + x;
        for wx in 0..WINDOW_SIZE {
            let val1 = f64::from(p1[row + wx]) - mean1;
            let val2 = f64::from(p2[row + wx]) - mean2;
            sum += GAUSSIAN_KERNEL[wy][wx] * val1 * val2;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            image::Luma([((x * 7 + y * 13) % 256) as u8])
        })
    }

    fn noisy(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            image::Luma([((x * 31 + y * 17 + (x * y) % 5) % 256) as u8])
        })
    }

    #[test]
    fn identical_images_score_one() {
        let img = gradient(32, 32);
        let score = ssim(&img, &img);
        assert!((score - 1.0).abs() < 1e-6, "score {score}");
    }

    #[test]
    fn ssim_is_symmetric() {
        let a = gradient(32, 32);
        let b = noisy(32, 32);
        let ab = ssim(&a, &b);
        let ba = ssim(&b, &a);
        assert!((ab - ba).abs() < 1e-9, "{ab} vs {ba}");
    }

    #[test]
    fn different_images_score_below_one() {
        let a = gradient(32, 32);
        let b = noisy(32, 32);
        let score = ssim(&a, &b);
        assert!(score < 1.0);
        assert!(score > -1.0);
    }

    #[test]
    fn image_smaller_than_window_is_nan() {
        let a = gradient(5, 5);
        assert!(ssim(&a, &a).is_nan());
    }

    #[test]
    fn window_sized_image_has_no_anchors() {
        // Anchors stop strictly before dim - 11, so 11x11 scores no windows.
        let a = gradient(11, 11);
        assert!(ssim(&a, &a).is_nan());
    }

    #[test]
    fn fully_transparent_mask_is_nan() {
        let a = gradient(32, 32);
        let mask = GrayImage::from_pixel(32, 32, image::Luma([0]));
        assert!(ssim_with_alpha(&a, &a, &mask).is_nan());
    }

    #[test]
    fn opaque_mask_matches_plain_ssim() {
        let a = gradient(32, 32);
        let b = noisy(32, 32);
        let mask = GrayImage::from_pixel(32, 32, image::Luma([255]));
        assert_eq!(ssim(&a, &b), ssim_with_alpha(&a, &b, &mask));
    }

    #[test]
    fn single_opaque_pixel_keeps_overlapping_windows() {
        let a = gradient(32, 32);
        let mut mask = GrayImage::from_pixel(32, 32, image::Luma([0]));
        mask.put_pixel(0, 0, image::Luma([1]));
        // Only the window anchored at (0, 0) sees the opaque pixel.
        let score = ssim_with_alpha(&a, &a, &mask);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "equal dimensions")]
    fn mismatched_dimensions_panic() {
        let a = gradient(32, 32);
        let b = gradient(16, 32);
        ssim(&a, &b);
    }
}
