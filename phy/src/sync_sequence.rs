//! Synchronization Sequence Generation
//!
//! Zadoff-Chu sequences and the 62-sample primary sync sequence carried on
//! the sync symbol at the head of every slot.

use crate::config::SyncConfig;
use crate::grid::GridParameters;
use common::types::Sample;
use std::f64::consts::PI;

/// Length of the primary sync sequence
pub const PSS_LENGTH: usize = 62;

/// Default Zadoff-Chu root of the primary sync sequence
pub const DEFAULT_ROOT: u32 = 25;

/// Zadoff-Chu sequence `exp(-jπ·u·n·(n+1)/len)`
pub fn zadoff_chu(root: u32, len: usize) -> Vec<Sample> {
    let u = root as f64;
    let n_zc = len as f64;
    (0..len)
        .map(|n| {
            let n = n as f64;
            Sample::from_polar(1.0, -PI * u * n * (n + 1.0) / n_zc)
        })
        .collect()
}

/// Primary sync sequence: a length-63 Zadoff-Chu with the middle element
/// punctured
pub fn primary_sync_sequence(root: u32) -> Vec<Sample> {
    let u = root as f64;
    (0..PSS_LENGTH)
        .map(|n| {
            let m = (if n < PSS_LENGTH / 2 { n } else { n + 1 }) as f64;
            Sample::from_polar(1.0, -PI * u * m * (m + 1.0) / 63.0)
        })
        .collect()
}

/// Builds the sync symbol content
#[derive(Debug, Clone, Copy)]
pub struct SyncSequenceGenerator {
    root: u32,
    amplitude: f64,
}

impl Default for SyncSequenceGenerator {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl SyncSequenceGenerator {
    pub fn new(root: u32, amplitude: f64) -> Self {
        Self { root, amplitude }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.root, config.amplitude)
    }

    pub fn root(&self) -> u32 {
        self.root
    }

    /// Scaled primary sync sequence
    pub fn sequence(&self) -> Vec<Sample> {
        primary_sync_sequence(self.root)
            .into_iter()
            .map(|s| s * self.amplitude)
            .collect()
    }

    /// Centered sync row: the sequence straddles DC, which stays empty
    pub fn frequency_pattern(&self, grid: &GridParameters) -> Vec<Sample> {
        let n = grid.fft_size();
        let center = grid.center();
        let half = PSS_LENGTH / 2;
        let sequence = self.sequence();

        let mut row = vec![Sample::new(0.0, 0.0); n];
        row[center - half..center].copy_from_slice(&sequence[..half]);
        row[center + 1..center + 1 + half].copy_from_slice(&sequence[half..]);
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zadoff_chu_constant_envelope() {
        let zc = zadoff_chu(25, 63);
        assert_eq!(zc.len(), 63);
        assert!(zc.iter().all(|s| (s.norm() - 1.0).abs() < 1e-12));
        assert!((zc[0] - Sample::new(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_primary_sync_punctures_middle() {
        let pss = primary_sync_sequence(DEFAULT_ROOT);
        let zc = zadoff_chu(DEFAULT_ROOT, 63);
        assert_eq!(pss.len(), PSS_LENGTH);
        for n in 0..31 {
            assert!((pss[n] - zc[n]).norm() < 1e-9);
        }
        for n in 31..62 {
            assert!((pss[n] - zc[n + 1]).norm() < 1e-9);
        }
    }

    #[test]
    fn test_frequency_pattern_placement() {
        let grid = GridParameters::new(128).unwrap();
        let generator = SyncSequenceGenerator::default();
        let row = generator.frequency_pattern(&grid);
        let seq = generator.sequence();

        assert_eq!(row.len(), 128);
        assert_eq!(row[64], Sample::new(0.0, 0.0));
        assert_eq!(row[32], Sample::new(0.0, 0.0));
        assert_eq!(row[96], Sample::new(0.0, 0.0));
        assert_eq!(row[33], seq[0]);
        assert_eq!(row[63], seq[30]);
        assert_eq!(row[65], seq[31]);
        assert_eq!(row[95], seq[61]);
        assert!((row[33].norm() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_pattern_fits_smallest_fft() {
        let grid = GridParameters::new(64).unwrap();
        let row = SyncSequenceGenerator::default().frequency_pattern(&grid);
        assert_eq!(row[0], Sample::new(0.0, 0.0));
        assert_eq!(row[32], Sample::new(0.0, 0.0));
        assert!(row[1].norm() > 0.0);
        assert!(row[63].norm() > 0.0);
    }
}
