//! OFDM Modulation
//!
//! Maps a payload symbol stream onto the subcarrier grid, inserts the sync
//! symbol at the head of every slot and produces the time-domain frame with
//! cyclic prefixes.

use crate::config::OfdmConfig;
use crate::dft::OfdmTransform;
use crate::grid::{CarrierSet, GridParameters};
use crate::sync_sequence::SyncSequenceGenerator;
use crate::{DATA_SYMBOLS_PER_SLOT, SYMBOLS_PER_SLOT};
use common::types::Sample;
use ndarray::Array2;
use std::sync::Arc;
use tracing::debug;

/// OFDM modulator
#[derive(Debug, Clone)]
pub struct OfdmModulator {
    /// Shared grid geometry
    grid: Arc<GridParameters>,
    /// Planned inverse transform
    transform: OfdmTransform,
    /// Sync symbol content
    sync: SyncSequenceGenerator,
    /// Time-domain scale
    amplitude: f64,
}

impl OfdmModulator {
    /// Create a new OFDM modulator
    pub fn new(grid: Arc<GridParameters>, config: &OfdmConfig) -> Self {
        let transform = OfdmTransform::new(grid.fft_size());
        Self {
            grid,
            transform,
            sync: SyncSequenceGenerator::from_config(&config.sync),
            amplitude: config.amplitude,
        }
    }

    pub fn grid(&self) -> &Arc<GridParameters> {
        &self.grid
    }

    /// Number of OFDM symbols (sync included) a payload occupies
    pub fn symbol_count(&self, payload_len: usize) -> usize {
        let data_rows = data_row_count(payload_len, self.grid.data_carrier_count());
        data_rows / DATA_SYMBOLS_PER_SLOT * SYMBOLS_PER_SLOT
    }

    /// Frequency-domain symbol grid of shape `(num_symbols, fft_size)`
    ///
    /// Rows are in centered order. Row 0 of every slot holds the sync
    /// pattern; data rows carry payload on the data subcarriers and the
    /// pilot value on the pilot subcarriers.
    pub fn build_grid(&self, payload: &[Sample]) -> Array2<Sample> {
        let n = self.grid.fft_size();
        let data_carriers = self.grid.active_carriers(CarrierSet::Data);
        let pilot_value = self.grid.pilot_value();
        let num_symbols = self.symbol_count(payload.len());

        let sync_row = self.sync.frequency_pattern(&self.grid);
        let mut chunks = payload.chunks(data_carriers.len());

        let mut symbols = Array2::<Sample>::zeros((num_symbols, n));
        for (index, mut row) in symbols.outer_iter_mut().enumerate() {
            if index % SYMBOLS_PER_SLOT == 0 {
                for (dst, &src) in row.iter_mut().zip(&sync_row) {
                    *dst = src;
                }
                continue;
            }

            for &k in self.grid.pilot_carriers() {
                row[k] = pilot_value;
            }
            // Rows past the payload stay zero apart from pilots
            if let Some(chunk) = chunks.next() {
                for (&k, &value) in data_carriers.iter().zip(chunk) {
                    row[k] = value;
                }
            }
        }

        debug!(
            "Built symbol grid: {} payload values into {} symbols ({} slots)",
            payload.len(),
            num_symbols,
            num_symbols / SYMBOLS_PER_SLOT
        );
        symbols
    }

    /// Modulate a payload into a `(num_symbols, fft_size + cp_len)` matrix
    pub fn modulate(&self, payload: &[Sample]) -> Array2<Sample> {
        let symbols = self.build_grid(payload);
        let symbol_len = self.grid.symbol_len();

        let mut frame = Array2::<Sample>::zeros((symbols.nrows(), symbol_len));
        for (spectrum, mut out) in symbols.outer_iter().zip(frame.outer_iter_mut()) {
            let centered = spectrum.to_vec();
            let timed = self.add_cyclic_prefix(&self.transform.synthesize(&centered));
            for (dst, src) in out.iter_mut().zip(timed) {
                *dst = src * self.amplitude;
            }
        }

        debug!(
            "Modulated {} symbols, {} samples",
            frame.nrows(),
            frame.len()
        );
        frame
    }

    /// Modulate a payload into a contiguous sample stream
    pub fn modulate_flat(&self, payload: &[Sample]) -> Vec<Sample> {
        self.modulate(payload).iter().copied().collect()
    }

    /// Time-domain body of the sync symbol at transmit scale, without CP
    pub fn sync_reference(&self) -> Vec<Sample> {
        let pattern = self.sync.frequency_pattern(&self.grid);
        self.transform
            .synthesize(&pattern)
            .into_iter()
            .map(|s| s * self.amplitude)
            .collect()
    }

    /// Prepend the last `cp_len` samples of the symbol body
    fn add_cyclic_prefix(&self, body: &[Sample]) -> Vec<Sample> {
        let cp_len = self.grid.cyclic_prefix_len();
        let mut symbol = Vec::with_capacity(body.len() + cp_len);
        symbol.extend_from_slice(&body[body.len() - cp_len..]);
        symbol.extend_from_slice(body);
        symbol
    }
}

/// Data rows needed for a payload, rounded up to whole slots
fn data_row_count(payload_len: usize, per_row: usize) -> usize {
    let rows = payload_len.div_ceil(per_row).max(1);
    rows.div_ceil(DATA_SYMBOLS_PER_SLOT) * DATA_SYMBOLS_PER_SLOT
}
