//! DFT helpers
//!
//! Planned forward and inverse transforms of one size, plus the spectrum
//! centering shift used on both sides of the link.

use common::types::Sample;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Forward/inverse FFT pair for one OFDM symbol size
#[derive(Clone)]
pub struct OfdmTransform {
    size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for OfdmTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfdmTransform").field("size", &self.size).finish()
    }
}

impl OfdmTransform {
    /// Plan both directions for `size` points
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            size,
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Centered spectrum to time domain, normalized by `1/N`
    pub fn synthesize(&self, centered: &[Sample]) -> Vec<Sample> {
        let mut buffer = centered.to_vec();
        fft_shift(&mut buffer);
        self.inverse.process(&mut buffer);

        let scale = 1.0 / self.size as f64;
        for sample in buffer.iter_mut() {
            *sample *= scale;
        }
        buffer
    }

    /// Time domain to centered spectrum, unnormalized
    pub fn analyze(&self, time: &[Sample]) -> Vec<Sample> {
        let mut buffer = time.to_vec();
        self.forward.process(&mut buffer);
        ifft_shift(&mut buffer);
        buffer
    }

    /// In-place unnormalized forward transform
    pub fn forward_in_place(&self, buffer: &mut [Sample]) {
        self.forward.process(buffer);
    }

    /// In-place unnormalized inverse transform
    pub fn inverse_in_place(&self, buffer: &mut [Sample]) {
        self.inverse.process(buffer);
    }
}

/// Move the zero-frequency bin from the center to index 0
pub fn fft_shift<T>(data: &mut [T]) {
    let half = data.len() / 2;
    data.rotate_right(half);
}

/// Undo [`fft_shift`]
pub fn ifft_shift<T>(data: &mut [T]) {
    let half = data.len() / 2;
    data.rotate_left(half);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_inverse_restores_order() {
        for len in [7usize, 64, 128, 2048] {
            let original: Vec<usize> = (0..len).collect();
            let mut data = original.clone();
            fft_shift(&mut data);
            ifft_shift(&mut data);
            assert_eq!(data, original);
        }
    }

    #[test]
    fn test_fft_shift_moves_center() {
        let mut data: Vec<usize> = (0..8).collect();
        fft_shift(&mut data);
        assert_eq!(data, vec![4, 5, 6, 7, 0, 1, 2, 3]);

        let mut odd: Vec<usize> = (0..5).collect();
        fft_shift(&mut odd);
        assert_eq!(odd, vec![3, 4, 0, 1, 2]);
        ifft_shift(&mut odd);
        assert_eq!(odd, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_transform_round_trip() {
        let transform = OfdmTransform::new(64);
        let spectrum: Vec<Sample> = (0..64)
            .map(|k| Sample::new(k as f64, -(k as f64) * 0.5))
            .collect();

        let time = transform.synthesize(&spectrum);
        let recovered = transform.analyze(&time);

        for (a, b) in recovered.iter().zip(&spectrum) {
            // analyze is unnormalized, synthesize carries 1/N
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_dc_bin_is_constant() {
        let transform = OfdmTransform::new(16);
        let mut spectrum = vec![Sample::new(0.0, 0.0); 16];
        spectrum[8] = Sample::new(16.0, 0.0);

        let time = transform.synthesize(&spectrum);
        for s in time {
            assert!((s - Sample::new(1.0, 0.0)).norm() < 1e-12);
        }
    }
}
