//! PHY configuration
//!
//! One serde-deserializable value shared by the transmit and receive sides.
//! Every field has a default so partial configuration files are accepted.

use crate::grid::GridParameters;
use crate::PhyError;
use common::types::FftSize;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Complete OFDM engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfdmConfig {
    /// FFT size (64, 128, 256, 512, 1024 or 2048)
    pub fft_size: FftSize,
    /// Explicit guard band length; the per-size table is used when unset
    pub guard_band: Option<usize>,
    /// Explicit pilot count; 10% of the FFT size when unset
    pub pilot_count: Option<usize>,
    /// Time-domain amplitude applied after the inverse transform
    pub amplitude: f64,
    /// Synchronization symbol parameters
    pub sync: SyncConfig,
    /// Detection thresholds for the timing search
    pub thresholds: SyncThresholds,
    /// Equalizer and outlier rejection
    pub equalizer: EqualizerConfig,
    /// Receive pipeline options
    pub receiver: ReceiverConfig,
}

impl Default for OfdmConfig {
    fn default() -> Self {
        Self {
            fft_size: FftSize::Fft128,
            guard_band: None,
            pilot_count: None,
            amplitude: 32768.0, // 2^15
            sync: SyncConfig::default(),
            thresholds: SyncThresholds::default(),
            equalizer: EqualizerConfig::default(),
            receiver: ReceiverConfig::default(),
        }
    }
}

impl OfdmConfig {
    /// Build the shared grid parameters for this configuration
    pub fn grid(&self) -> Result<Arc<GridParameters>, PhyError> {
        let grid = GridParameters::with_options(
            self.fft_size.len(),
            self.guard_band,
            self.pilot_count,
        )?;
        Ok(Arc::new(grid))
    }

    /// Check values that the grid cannot validate on its own
    pub fn validate(&self) -> Result<(), PhyError> {
        if !(self.amplitude.is_finite() && self.amplitude > 0.0) {
            return Err(PhyError::InvalidConfiguration(
                format!("amplitude must be positive, got {}", self.amplitude)
            ));
        }
        if !(self.sync.amplitude.is_finite() && self.sync.amplitude > 0.0) {
            return Err(PhyError::InvalidConfiguration(
                format!("sync amplitude must be positive, got {}", self.sync.amplitude)
            ));
        }
        let eq = &self.equalizer;
        if eq.min_magnitude >= eq.max_magnitude {
            return Err(PhyError::InvalidConfiguration(
                format!("outlier band ({}, {}) is empty", eq.min_magnitude, eq.max_magnitude)
            ));
        }
        Ok(())
    }
}

/// Synchronization symbol parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Zadoff-Chu root index of the primary sync sequence
    pub root: u32,
    /// Scale applied to the sync sequence on its subcarriers
    pub amplitude: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: 25,
            amplitude: 2.0,
        }
    }
}

/// Normalized correlation thresholds used by the timing search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncThresholds {
    /// Minimum CP correlation peak accepted as a symbol boundary
    pub cp_peak: f64,
    /// First-sample CP score above which the whole buffer is scanned
    pub cp_full_scan: f64,
    /// Sync sequence threshold for the time-domain search
    pub pss_time: f64,
    /// Sync sequence threshold for the FFT-based search
    pub pss_frequency: f64,
}

impl Default for SyncThresholds {
    fn default() -> Self {
        Self {
            cp_peak: 0.9,
            cp_full_scan: 0.97,
            pss_time: 0.98,
            pss_frequency: 0.95,
        }
    }
}

/// Equalizer options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerConfig {
    /// Divide subcarriers by the interpolated pilot amplitude
    pub amplitude_correction: bool,
    /// Magnitude the strongest recovered sample is scaled to
    pub constellation_radius: f64,
    /// Samples at or below this normalized magnitude are dropped
    pub min_magnitude: f64,
    /// Samples at or above this normalized magnitude are dropped
    pub max_magnitude: f64,
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        Self {
            amplitude_correction: false,
            constellation_radius: 3.0,
            min_magnitude: 0.2,
            max_magnitude: 1.5,
        }
    }
}

/// Domain of the sync sequence search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDomain {
    /// Per-offset normalized correlation in the time domain
    Time,
    /// Fast correlation through the frequency domain
    Frequency,
}

/// How symbol boundaries are derived once a frame start is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryStrategy {
    /// Whole symbol periods from the detected frame start
    SyncGrid,
    /// Cyclic-prefix self-correlation over the buffer from the frame start
    CyclicPrefix,
}

/// Receive pipeline options
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Domain used to find the frame start
    pub sync_domain: SyncDomain,
    /// Boundary derivation after the frame start
    pub boundary_strategy: BoundaryStrategy,
    /// Estimate and remove the carrier frequency offset
    pub correct_frequency_offset: bool,
    /// Upper bound on the slots demodulated after the frame start
    pub max_slots: Option<usize>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            sync_domain: SyncDomain::Time,
            boundary_strategy: BoundaryStrategy::SyncGrid,
            correct_frequency_offset: true,
            max_slots: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OfdmConfig::default();
        assert_eq!(config.fft_size, FftSize::Fft128);
        assert_eq!(config.amplitude, 32768.0);
        assert_eq!(config.thresholds.cp_peak, 0.9);
        assert_eq!(config.thresholds.pss_frequency, 0.95);
        assert!(!config.equalizer.amplitude_correction);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_grid_from_config() {
        let config = OfdmConfig {
            fft_size: FftSize::Fft256,
            ..Default::default()
        };
        let grid = config.grid().unwrap();
        assert_eq!(grid.fft_size(), 256);
        assert_eq!(grid.pilot_carriers().len(), 25);
    }

    #[test]
    fn test_invalid_amplitude_rejected() {
        let config = OfdmConfig {
            amplitude: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PhyError::InvalidConfiguration(_))));
    }
}
