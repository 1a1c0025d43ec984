//! Gaussian weighting window for the SSIM metric.
//!
//! The 11x11 window with sigma 1.5 is the one used by the original SSIM
//! paper (Wang et al. 2004) and by every cross-implementation test corpus,
//! so the values are frozen here rather than computed at startup. The table
//! is already normalized: the entries sum to ~1.

/// Side length of the SSIM comparison window.
pub const WINDOW_SIZE: usize = 11;

/// 11x11 Gaussian weights, sigma 1.5, normalized.
#[rustfmt::skip]
pub const GAUSSIAN_KERNEL: [[f64; WINDOW_SIZE]; WINDOW_SIZE] = [
    [1.0576e-06, 7.8144e-06, 3.7022e-05, 1.1246e-04, 2.1905e-04, 2.7356e-04, 2.1905e-04, 1.1246e-04, 3.7022e-05, 7.8144e-06, 1.0576e-06],
    [7.8144e-06, 5.7741e-05, 2.7356e-04, 8.3101e-04, 1.6186e-03, 2.0214e-03, 1.6186e-03, 8.3101e-04, 2.7356e-04, 5.7741e-05, 7.8144e-06],
    [3.7022e-05, 2.7356e-04, 1.2961e-03, 3.9371e-03, 7.6684e-03, 9.5766e-03, 7.6684e-03, 3.9371e-03, 1.2961e-03, 2.7356e-04, 3.7022e-05],
    [1.1246e-04, 8.3101e-04, 3.9371e-03, 1.1960e-02, 2.3294e-02, 2.9091e-02, 2.3294e-02, 1.1960e-02, 3.9371e-03, 8.3101e-04, 1.1246e-04],
    [2.1905e-04, 1.6186e-03, 7.6684e-03, 2.3294e-02, 4.5371e-02, 5.6662e-02, 4.5371e-02, 2.3294e-02, 7.6684e-03, 1.6186e-03, 2.1905e-04],
    [2.7356e-04, 2.0214e-03, 9.5766e-03, 2.9091e-02, 5.6662e-02, 7.0762e-02, 5.6662e-02, 2.9091e-02, 9.5766e-03, 2.0214e-03, 2.7356e-04],
    [2.1905e-04, 1.6186e-03, 7.6684e-03, 2.3294e-02, 4.5371e-02, 5.6662e-02, 4.5371e-02, 2.3294e-02, 7.6684e-03, 1.6186e-03, 2.1905e-04],
    [1.1246e-04, 8.3101e-04, 3.9371e-03, 1.1960e-02, 2.3294e-02, 2.9091e-02, 2.3294e-02, 1.1960e-02, 3.9371e-03, 8.3101e-04, 1.1246e-04],
    [3.7022e-05, 2.7356e-04, 1.2961e-03, 3.9371e-03, 7.6684e-03, 9.5766e-03, 7.6684e-03, 3.9371e-03, 1.2961e-03, 2.7356e-04, 3.7022e-05],
    [7.8144e-06, 5.7741e-05, 2.7356e-04, 8.3101e-04, 1.6186e-03, 2.0214e-03, 1.6186e-03, 8.3101e-04, 2.7356e-04, 5.7741e-05, 7.8144e-06],
    [1.0576e-06, 7.8144e-06, 3.7022e-05, 1.1246e-04, 2.1905e-04, 2.7356e-04, 2.1905e-04, 1.1246e-04, 3.7022e-05, 7.8144e-06, 1.0576e-06],
];
