//! OFDM Demodulation and Equalization
//!
//! Turns time-aligned symbols back into payload values: body extraction,
//! forward transform, carrier selection, pilot-based phase equalization and
//! outlier stripping.

use crate::config::{EqualizerConfig, OfdmConfig};
use crate::dft::OfdmTransform;
use crate::grid::{CarrierSet, GridParameters};
use crate::observer::{NullObserver, TraceObserver};
use crate::{PhyError, SYMBOLS_PER_SLOT};
use common::types::Sample;
use common::utils::peak_magnitude;
use ndarray::{Array2, Axis};
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-subcarrier channel estimate interpolated from the pilots
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEstimate {
    /// Phase rotation in radians, unwrapped across the row
    pub phase: Vec<f64>,
    /// Received pilot magnitude
    pub amplitude: Vec<f64>,
}

/// OFDM demodulator
pub struct OfdmDemodulator {
    grid: Arc<GridParameters>,
    transform: OfdmTransform,
    /// Transmit amplitude removed after the forward transform
    amplitude: f64,
    equalizer: EqualizerConfig,
    observer: Arc<dyn TraceObserver>,
}

impl OfdmDemodulator {
    /// Create a new OFDM demodulator
    pub fn new(grid: Arc<GridParameters>, config: &OfdmConfig) -> Self {
        let transform = OfdmTransform::new(grid.fft_size());
        Self {
            grid,
            transform,
            amplitude: config.amplitude,
            equalizer: config.equalizer,
            observer: Arc::new(NullObserver),
        }
    }

    /// Attach a diagnostic observer
    pub fn with_observer(mut self, observer: Arc<dyn TraceObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Symbol bodies `[b + cp, b + cp + N)` for every boundary that fits
    pub fn extract_symbols(&self, buffer: &[Sample], boundaries: &[usize]) -> Array2<Sample> {
        let n = self.grid.fft_size();
        let cp_len = self.grid.cyclic_prefix_len();

        let bodies: Vec<&[Sample]> = boundaries
            .iter()
            .filter_map(|&b| buffer.get(b + cp_len..b + cp_len + n))
            .collect();
        if bodies.len() < boundaries.len() {
            debug!(
                "Skipped {} boundaries without a complete symbol",
                boundaries.len() - bodies.len()
            );
        }

        let mut symbols = Array2::<Sample>::zeros((bodies.len(), n));
        for (mut row, body) in symbols.outer_iter_mut().zip(bodies) {
            for (dst, &src) in row.iter_mut().zip(body) {
                *dst = src;
            }
        }
        symbols
    }

    /// Forward transform every row into the centered spectrum at payload
    /// scale
    pub fn to_frequency(&self, symbols: &Array2<Sample>) -> Array2<Sample> {
        let mut spectra = Array2::<Sample>::zeros(symbols.raw_dim());
        let scale = 1.0 / self.amplitude;
        for (row, mut out) in symbols.outer_iter().zip(spectra.outer_iter_mut()) {
            let spectrum = self.transform.analyze(&row.to_vec());
            for (dst, src) in out.iter_mut().zip(spectrum) {
                *dst = src * scale;
            }
        }
        spectra
    }

    /// Keep only the subcarriers of `set`, one row per symbol
    pub fn select_carriers(&self, spectra: &Array2<Sample>, set: CarrierSet) -> Array2<Sample> {
        spectra.select(Axis(1), self.grid.active_carriers(set))
    }

    /// Interpolate the channel from the pilots of one `DataAndPilots` row
    pub fn estimate_channel(&self, row: &[Sample]) -> Result<ChannelEstimate, PhyError> {
        let positions: Vec<usize> = self
            .grid
            .pilot_positions()
            .iter()
            .copied()
            .filter(|&p| p < row.len())
            .collect();
        if positions.len() < 2 {
            return Err(PhyError::InsufficientPilots { found: positions.len() });
        }

        let reference_phase = self.grid.pilot_value().arg();
        let mut phases: Vec<f64> = positions
            .iter()
            .map(|&p| row[p].arg() - reference_phase)
            .collect();
        unwrap_phase(&mut phases);
        let amplitudes: Vec<f64> = positions.iter().map(|&p| row[p].norm()).collect();

        Ok(ChannelEstimate {
            phase: interpolate(&positions, &phases, row.len()),
            amplitude: interpolate(&positions, &amplitudes, row.len()),
        })
    }

    /// De-rotate one `DataAndPilots` row by its interpolated pilot phase
    pub fn equalize_row(&self, row: &[Sample]) -> Result<Vec<Sample>, PhyError> {
        let channel = self.estimate_channel(row)?;
        let pilot_magnitude = self.grid.pilot_value().norm();

        let equalized = row
            .iter()
            .zip(channel.phase.iter().zip(&channel.amplitude))
            .map(|(&s, (&phase, &amplitude))| {
                let rotated = s * Sample::from_polar(1.0, -phase);
                if self.equalizer.amplitude_correction && amplitude > 0.0 {
                    rotated * (pilot_magnitude / amplitude)
                } else {
                    rotated
                }
            })
            .collect();
        Ok(equalized)
    }

    /// Equalize every row of a `DataAndPilots` selection
    pub fn equalize(&self, rows: &Array2<Sample>) -> Result<Array2<Sample>, PhyError> {
        let mut equalized = Array2::<Sample>::zeros(rows.raw_dim());
        for (row, mut out) in rows.outer_iter().zip(equalized.outer_iter_mut()) {
            let values = self.equalize_row(&row.to_vec())?;
            for (dst, src) in out.iter_mut().zip(values) {
                *dst = src;
            }
        }
        Ok(equalized)
    }

    /// Equalized payload values with sync rows and pilots removed
    ///
    /// No outlier rejection is applied, so a perfect channel returns the
    /// modulated payload (plus zero padding) exactly.
    pub fn demodulate_payload(
        &self,
        buffer: &[Sample],
        boundaries: &[usize],
    ) -> Result<Vec<Sample>, PhyError> {
        let equalized = self.equalized_data_rows(buffer, boundaries)?;

        let mut is_pilot = vec![false; self.grid.row_width()];
        for &p in self.grid.pilot_positions() {
            is_pilot[p] = true;
        }

        let payload: Vec<Sample> = equalized
            .outer_iter()
            .flat_map(|row| {
                row.iter()
                    .zip(&is_pilot)
                    .filter_map(|(&s, &pilot)| (!pilot).then_some(s))
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok(payload)
    }

    /// Full recovery: equalize, drop sync rows and strip pilots and empty
    /// subcarriers by magnitude
    pub fn recover_symbols(
        &self,
        buffer: &[Sample],
        boundaries: &[usize],
    ) -> Result<Vec<Sample>, PhyError> {
        let equalized = self.equalized_data_rows(buffer, boundaries)?;
        let flat: Vec<Sample> = equalized.iter().copied().collect();
        self.observer.observe("equalized", &flat);

        let eq = &self.equalizer;
        let symbols = reject_outliers(
            &flat,
            eq.constellation_radius,
            (eq.min_magnitude, eq.max_magnitude),
        );
        debug!("Recovered {} of {} equalized values", symbols.len(), flat.len());
        Ok(symbols)
    }

    fn equalized_data_rows(
        &self,
        buffer: &[Sample],
        boundaries: &[usize],
    ) -> Result<Array2<Sample>, PhyError> {
        let symbols = self.extract_symbols(buffer, boundaries);
        if symbols.nrows() == 0 {
            return Ok(Array2::zeros((0, self.grid.row_width())));
        }

        let spectra = self.to_frequency(&symbols);
        let selected = self.select_carriers(&spectra, CarrierSet::DataAndPilots);

        let data_rows: Vec<usize> = (0..selected.nrows())
            .filter(|i| i % SYMBOLS_PER_SLOT != 0)
            .collect();
        let data = selected.select(Axis(0), &data_rows);
        if data.nrows() == 0 {
            warn!("Received only sync symbols, no data rows to equalize");
        }
        self.equalize(&data)
    }
}

/// Scale `symbols` so the strongest has magnitude `radius`, then keep those
/// with magnitude strictly inside `band`
pub fn reject_outliers(symbols: &[Sample], radius: f64, band: (f64, f64)) -> Vec<Sample> {
    let peak = peak_magnitude(symbols);
    if peak == 0.0 {
        return Vec::new();
    }
    let scale = radius / peak;
    let (low, high) = band;

    symbols
        .iter()
        .map(|&s| s * scale)
        .filter(|s| {
            let magnitude = s.norm();
            magnitude > low && magnitude < high
        })
        .collect()
}

/// Remove 2π jumps between consecutive phases
fn unwrap_phase(phases: &mut [f64]) {
    for i in 1..phases.len() {
        let mut delta = phases[i] - phases[i - 1];
        while delta > PI {
            phases[i] -= 2.0 * PI;
            delta -= 2.0 * PI;
        }
        while delta < -PI {
            phases[i] += 2.0 * PI;
            delta += 2.0 * PI;
        }
    }
}

/// Piecewise-linear interpolation over `0..len`, holding the end values
/// outside the known positions
fn interpolate(positions: &[usize], values: &[f64], len: usize) -> Vec<f64> {
    let (first, last) = (positions[0], positions[positions.len() - 1]);
    let mut segment = 0;

    (0..len)
        .map(|x| {
            if x <= first {
                return values[0];
            }
            if x >= last {
                return values[values.len() - 1];
            }
            while positions[segment + 1] <= x {
                segment += 1;
            }
            let (x0, x1) = (positions[segment], positions[segment + 1]);
            let t = (x - x0) as f64 / (x1 - x0) as f64;
            values[segment] + (values[segment + 1] - values[segment]) * t
        })
        .collect()
}
