//! OFDM Receiver Pipeline
//!
//! Runs timing synchronization, frequency offset correction and demodulation
//! on one received buffer.

use crate::cfo::FrequencyOffsetCorrector;
use crate::config::{BoundaryStrategy, OfdmConfig, ReceiverConfig};
use crate::demodulator::OfdmDemodulator;
use crate::grid::GridParameters;
use crate::modulator::OfdmModulator;
use crate::observer::{NullObserver, TraceObserver};
use crate::timing::{grid_boundaries, TimingSynchronizer};
use crate::{PhyError, SYMBOLS_PER_SLOT};
use common::types::Sample;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one receive call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reception {
    /// Start of the first sync symbol (CP included)
    pub frame_start: Option<usize>,
    /// Estimated and removed carrier frequency offset
    pub frequency_offset_hz: Option<f64>,
    /// Symbol boundaries used for demodulation
    pub boundaries: Vec<usize>,
    /// Recovered payload symbols, normalized to the constellation radius
    pub symbols: Vec<Sample>,
}

impl Reception {
    pub fn is_detected(&self) -> bool {
        self.frame_start.is_some()
    }
}

/// Complete receive chain sharing one grid
pub struct OfdmReceiver {
    grid: Arc<GridParameters>,
    options: ReceiverConfig,
    synchronizer: TimingSynchronizer,
    corrector: FrequencyOffsetCorrector,
    demodulator: OfdmDemodulator,
    observer: Arc<dyn TraceObserver>,
}

impl OfdmReceiver {
    /// Build every receive stage from `grid` and `config`
    pub fn new(grid: Arc<GridParameters>, config: &OfdmConfig) -> Self {
        let reference = OfdmModulator::new(grid.clone(), config).sync_reference();

        Self {
            synchronizer: TimingSynchronizer::new(
                grid.clone(),
                reference.clone(),
                config.thresholds,
            ),
            corrector: FrequencyOffsetCorrector::new(grid.clone(), reference),
            demodulator: OfdmDemodulator::new(grid.clone(), config),
            options: config.receiver,
            observer: Arc::new(NullObserver),
            grid,
        }
    }

    /// Build the grid from `config` and the receiver on top of it
    pub fn from_config(config: &OfdmConfig) -> Result<Self, PhyError> {
        config.validate()?;
        Ok(Self::new(config.grid()?, config))
    }

    /// Attach a diagnostic observer to every stage
    pub fn with_observer(mut self, observer: Arc<dyn TraceObserver>) -> Self {
        self.synchronizer = self.synchronizer.with_observer(observer.clone());
        self.demodulator = self.demodulator.with_observer(observer.clone());
        self.observer = observer;
        self
    }

    pub fn grid(&self) -> &Arc<GridParameters> {
        &self.grid
    }

    /// Recover the payload symbols of the first frame in `buffer`
    pub fn receive(&self, buffer: &[Sample]) -> Result<Reception, PhyError> {
        self.observer.observe("rx", buffer);

        let Some(frame_start) = self
            .synchronizer
            .find_frame_start(buffer, self.options.sync_domain)
        else {
            warn!("No sync symbol found in {} samples", buffer.len());
            return Ok(Reception::default());
        };

        let frequency_offset_hz = if self.options.correct_frequency_offset {
            self.corrector.estimate(buffer, frame_start)
        } else {
            None
        };
        let corrected = match frequency_offset_hz {
            Some(offset) => {
                let corrected = self.corrector.correct(buffer, offset);
                self.observer.observe("cfo_corrected", &corrected);
                corrected
            }
            None => buffer.to_vec(),
        };

        let mut boundaries = match self.options.boundary_strategy {
            BoundaryStrategy::SyncGrid => {
                grid_boundaries(frame_start, self.grid.symbol_len(), corrected.len())
            }
            BoundaryStrategy::CyclicPrefix => {
                self.synchronizer.cp_boundaries_from(&corrected, frame_start)
            }
        };
        if let Some(slots) = self.options.max_slots {
            boundaries.truncate(slots * SYMBOLS_PER_SLOT);
        }
        debug!("Demodulating {} symbols from {}", boundaries.len(), frame_start);

        let symbols = self.demodulator.recover_symbols(&corrected, &boundaries)?;
        info!(
            "Received frame at {}: {} symbols, {} payload values",
            frame_start,
            boundaries.len(),
            symbols.len()
        );

        Ok(Reception {
            frame_start: Some(frame_start),
            frequency_offset_hz,
            boundaries,
            symbols,
        })
    }
}
