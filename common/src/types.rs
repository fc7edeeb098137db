//! Common Types for the OFDM Transceiver
//!
//! Defines fundamental types shared by the PHY engine, the sample interfaces
//! and the command line front-end

use num_complex::Complex64;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Complex baseband sample used throughout the signal chain
pub type Sample = Complex64;

/// Rejected FFT size
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid FFT size {0}, valid options are 64, 128, 256, 512, 1024, 2048")]
pub struct UnsupportedFftSize(pub usize);

/// Supported FFT sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum FftSize {
    Fft64 = 64,
    Fft128 = 128,
    Fft256 = 256,
    Fft512 = 512,
    Fft1024 = 1024,
    Fft2048 = 2048,
}

impl FftSize {
    /// All supported sizes in ascending order
    pub const ALL: [FftSize; 6] = [
        FftSize::Fft64,
        FftSize::Fft128,
        FftSize::Fft256,
        FftSize::Fft512,
        FftSize::Fft1024,
        FftSize::Fft2048,
    ];

    /// Validate a raw FFT length
    pub fn from_len(len: usize) -> Option<Self> {
        Self::from_usize(len)
    }

    /// Number of FFT bins
    pub fn len(&self) -> usize {
        self.to_usize().unwrap_or(64)
    }

    /// Cyclic prefix length (a quarter of the FFT)
    pub fn cyclic_prefix_len(&self) -> usize {
        self.len() / 4
    }

    /// Default number of zeroed guard subcarriers
    pub fn guard_band_len(&self) -> usize {
        match self {
            FftSize::Fft64 => 27,
            FftSize::Fft128 => 55,
            FftSize::Fft256 => 75,
            FftSize::Fft512 => 211,
            FftSize::Fft1024 => 423,
            FftSize::Fft2048 => 847,
        }
    }

    /// Default pilot count, 10% of the subcarriers
    pub fn default_pilot_count(&self) -> usize {
        self.len() / 10
    }
}

impl TryFrom<usize> for FftSize {
    type Error = UnsupportedFftSize;

    fn try_from(len: usize) -> Result<Self, Self::Error> {
        Self::from_len(len).ok_or(UnsupportedFftSize(len))
    }
}

impl From<FftSize> for usize {
    fn from(size: FftSize) -> usize {
        size.len()
    }
}

/// Subcarrier spacing values in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum SubcarrierSpacing {
    /// 15 kHz
    Scs15 = 15,
    /// 30 kHz
    Scs30 = 30,
    /// 60 kHz
    Scs60 = 60,
}

impl SubcarrierSpacing {
    /// Spacing in Hz
    pub fn as_hz(&self) -> f64 {
        self.to_u32().unwrap_or(15) as f64 * 1_000.0
    }

    /// Sample rate of an OFDM symbol with `fft_size` bins at this spacing
    pub fn sample_rate(&self, fft_size: FftSize) -> f64 {
        fft_size.len() as f64 * self.as_hz()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_size_validation() {
        assert_eq!(FftSize::from_len(128), Some(FftSize::Fft128));
        assert_eq!(FftSize::from_len(2048), Some(FftSize::Fft2048));
        assert!(FftSize::from_len(100).is_none());
        assert!(FftSize::from_len(1536).is_none());
        assert_eq!(FftSize::try_from(96), Err(UnsupportedFftSize(96)));
    }

    #[test]
    fn test_fft_size_derived_lengths() {
        assert_eq!(FftSize::Fft64.cyclic_prefix_len(), 16);
        assert_eq!(FftSize::Fft128.cyclic_prefix_len(), 32);
        assert_eq!(FftSize::Fft128.guard_band_len(), 55);
        assert_eq!(FftSize::Fft2048.guard_band_len(), 847);
        assert_eq!(FftSize::Fft128.default_pilot_count(), 12);
        assert_eq!(FftSize::Fft256.default_pilot_count(), 25);
    }

    #[test]
    fn test_sample_rate() {
        let rate = SubcarrierSpacing::Scs15.sample_rate(FftSize::Fft2048);
        assert_eq!(rate, 30_720_000.0);

        let rate = SubcarrierSpacing::Scs15.sample_rate(FftSize::Fft128);
        assert_eq!(rate, 1_920_000.0);
    }

    #[test]
    fn test_fft_size_conversion() {
        let raw: usize = FftSize::Fft512.into();
        assert_eq!(raw, 512);
        for size in FftSize::ALL {
            assert_eq!(FftSize::try_from(size.len()), Ok(size));
        }
    }
}
