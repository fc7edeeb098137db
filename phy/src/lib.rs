//! OFDM Physical Layer Library
//!
//! This crate implements the OFDM transceiver engine: grid derivation,
//! synchronization sequences, modulation, timing and frequency recovery, and
//! pilot-based equalization.

pub mod config;
pub mod grid;
pub mod dft;
pub mod correlation;
pub mod sync_sequence;
pub mod modulator;
pub mod timing;
pub mod cfo;
pub mod demodulator;
pub mod receiver;
pub mod constellation;
pub mod observer;

// Re-export commonly used types
pub use config::{
    BoundaryStrategy, EqualizerConfig, OfdmConfig, ReceiverConfig, SyncConfig, SyncDomain,
    SyncThresholds,
};
pub use grid::{CarrierSet, GridParameters};
pub use correlation::{correlate, CorrelationMode};
pub use sync_sequence::{primary_sync_sequence, zadoff_chu, SyncSequenceGenerator};
pub use modulator::OfdmModulator;
pub use timing::{TimingStrategy, TimingSynchronizer};
pub use cfo::{correct_frequency_offset, estimate_frequency_offset, FrequencyOffsetCorrector};
pub use demodulator::{reject_outliers, ChannelEstimate, OfdmDemodulator};
pub use receiver::{OfdmReceiver, Reception};
pub use constellation::Modulation;
pub use observer::{NullObserver, TraceObserver, TracingObserver};

use thiserror::Error;

/// Number of OFDM symbols in a slot: one sync symbol followed by data symbols
pub const SYMBOLS_PER_SLOT: usize = 6;

/// Number of data symbols in a slot
pub const DATA_SYMBOLS_PER_SLOT: usize = SYMBOLS_PER_SLOT - 1;

/// Errors raised by the PHY engine
#[derive(Error, Debug)]
pub enum PhyError {
    #[error("Invalid FFT size {0}, valid options are 64, 128, 256, 512, 1024, 2048")]
    InvalidFftSize(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Pilot interpolation needs at least 2 pilots, found {found}")]
    InsufficientPilots { found: usize },

    #[error("Sequence length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Processing error: {0}")]
    ProcessingError(String),
}

impl From<common::UnsupportedFftSize> for PhyError {
    fn from(err: common::UnsupportedFftSize) -> Self {
        PhyError::InvalidFftSize(err.0)
    }
}
