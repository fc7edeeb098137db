//! Carrier Frequency Offset estimation and correction
//!
//! The offset is estimated once per buffer from the phase drift between the
//! two halves of the sync symbol, then removed from the whole buffer.

use crate::grid::GridParameters;
use common::types::Sample;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::{debug, info};

/// Estimate the frequency offset in Hz from the sync symbol body
///
/// `body_start` is the index of the first body sample of the sync symbol in
/// `buffer`. The received window is correlated against `reference` in two
/// equal halves; the phase advance between them over half the window
/// duration gives the offset. This replaces the single-window form (angle of
/// one whole-window correlation divided by the window duration), which is
/// biased by the reference's own phase. Returns `None` when the window does
/// not fit or carries no energy.
pub fn estimate_frequency_offset(
    buffer: &[Sample],
    body_start: usize,
    reference: &[Sample],
    sample_rate: f64,
) -> Option<f64> {
    let half = reference.len() / 2;
    if half == 0 || sample_rate <= 0.0 {
        return None;
    }
    let window = buffer.get(body_start..body_start + 2 * half)?;

    let partial = |range: std::ops::Range<usize>| -> Sample {
        window[range.clone()]
            .iter()
            .zip(&reference[range])
            .map(|(rx, r)| rx * r.conj())
            .sum()
    };
    let first = partial(0..half);
    let second = partial(half..2 * half);

    if first.norm() == 0.0 || second.norm() == 0.0 {
        return None;
    }

    let phase = (second * first.conj()).arg();
    let half_duration = half as f64 / sample_rate;
    let offset = phase / (2.0 * PI * half_duration);

    debug!("CFO phase drift {:.6} rad over {} samples", phase, half);
    Some(offset)
}

/// Remove a frequency offset from a whole buffer
///
/// Sample `n` is multiplied by `exp(-j·2π·f·(t0 + n/fs))`.
pub fn correct_frequency_offset(
    signal: &[Sample],
    offset_hz: f64,
    sample_rate: f64,
    reference_time: f64,
) -> Vec<Sample> {
    signal
        .iter()
        .enumerate()
        .map(|(n, &s)| {
            let t = reference_time + n as f64 / sample_rate;
            s * Sample::from_polar(1.0, -2.0 * PI * offset_hz * t)
        })
        .collect()
}

/// Frequency offset estimation bound to one grid and sync reference
pub struct FrequencyOffsetCorrector {
    grid: Arc<GridParameters>,
    reference: Vec<Sample>,
}

impl FrequencyOffsetCorrector {
    pub fn new(grid: Arc<GridParameters>, reference: Vec<Sample>) -> Self {
        Self { grid, reference }
    }

    /// Estimate the offset of a frame whose sync symbol (CP included) starts
    /// at `frame_start`
    pub fn estimate(&self, buffer: &[Sample], frame_start: usize) -> Option<f64> {
        let body_start = frame_start + self.grid.cyclic_prefix_len();
        let offset = estimate_frequency_offset(
            buffer,
            body_start,
            &self.reference,
            self.grid.sample_rate(),
        )?;
        info!("Estimated carrier frequency offset: {:.2} Hz", offset);
        Some(offset)
    }

    /// De-rotate the whole buffer by `offset_hz`
    pub fn correct(&self, buffer: &[Sample], offset_hz: f64) -> Vec<Sample> {
        correct_frequency_offset(buffer, offset_hz, self.grid.sample_rate(), 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_sequence::zadoff_chu;

    fn rotate(signal: &[Sample], offset_hz: f64, sample_rate: f64) -> Vec<Sample> {
        correct_frequency_offset(signal, -offset_hz, sample_rate, 0.0)
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let signal = zadoff_chu(25, 63);
        let corrected = correct_frequency_offset(&signal, 0.0, 1_920_000.0, 0.5);
        for (a, b) in corrected.iter().zip(&signal) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_correction_inverts_rotation() {
        let sample_rate = 1_920_000.0;
        let signal = zadoff_chu(29, 139);
        let rotated = rotate(&signal, 1234.5, sample_rate);
        let restored = correct_frequency_offset(&rotated, 1234.5, sample_rate, 0.0);
        for (a, b) in restored.iter().zip(&signal) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_estimate_exact_on_constant_envelope() {
        let sample_rate = 1_920_000.0;
        let reference = zadoff_chu(25, 128);
        for offset in [-4000.0, -150.0, 0.0, 700.0, 7500.0] {
            let mut buffer = vec![Sample::new(0.0, 0.0); 40];
            buffer.extend(rotate(&reference, offset, sample_rate));

            let estimate = estimate_frequency_offset(&buffer, 40, &reference, sample_rate).unwrap();
            assert!((estimate - offset).abs() < 1e-6, "offset {} estimate {}", offset, estimate);
        }
    }

    #[test]
    fn test_estimate_needs_full_window() {
        let reference = zadoff_chu(25, 64);
        let buffer = vec![Sample::new(1.0, 0.0); 70];
        assert!(estimate_frequency_offset(&buffer, 10, &reference, 960_000.0).is_none());

        let silent = vec![Sample::new(0.0, 0.0); 128];
        assert!(estimate_frequency_offset(&silent, 0, &reference, 960_000.0).is_none());
    }

    #[test]
    fn test_corrector_uses_grid_rate() {
        let grid = Arc::new(GridParameters::new(128).unwrap());
        let reference = zadoff_chu(25, 128);
        let corrector = FrequencyOffsetCorrector::new(grid.clone(), reference.clone());

        let mut buffer = vec![Sample::new(0.0, 0.0); 32];
        buffer.extend_from_slice(&reference);
        let rotated = rotate(&buffer, 900.0, grid.sample_rate());

        let estimate = corrector.estimate(&rotated, 0).unwrap();
        assert!((estimate - 900.0).abs() < 1e-6);

        let corrected = corrector.correct(&rotated, estimate);
        for (a, b) in corrected[32..].iter().zip(&reference) {
            assert!((a - b).norm() < 1e-6);
        }
    }
}
