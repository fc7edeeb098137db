//! OFDM Grid Parameters
//!
//! Derives the cyclic prefix, guard band and pilot layout of one FFT size.
//! The result is immutable and shared between the transmit and receive
//! stages.

use crate::PhyError;
use common::types::{FftSize, Sample, SubcarrierSpacing};
use tracing::debug;

/// Reference value transmitted on every pilot subcarrier
pub const PILOT_VALUE: Sample = Sample::new(2.0, 2.0);

/// Subset of the active subcarriers of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierSet {
    /// Payload subcarriers only
    Data,
    /// Payload and pilot subcarriers
    DataAndPilots,
}

/// Grid geometry for one FFT size
#[derive(Debug, Clone, PartialEq)]
pub struct GridParameters {
    fft_size: FftSize,
    cyclic_prefix_len: usize,
    guard_band_len: usize,
    pilot_carriers: Vec<usize>,
    /// Active subcarriers excluding pilots
    data_carriers: Vec<usize>,
    /// Active subcarriers including pilots
    active_carriers: Vec<usize>,
    /// Offsets of the pilots inside `active_carriers`
    pilot_positions: Vec<usize>,
}

impl GridParameters {
    /// Grid with the default guard band and pilot count for `fft_size`
    pub fn new(fft_size: usize) -> Result<Self, PhyError> {
        Self::with_options(fft_size, None, None)
    }

    /// Grid with an optional explicit guard band and pilot count
    pub fn with_options(
        fft_size: usize,
        guard_band: Option<usize>,
        pilot_count: Option<usize>,
    ) -> Result<Self, PhyError> {
        let size = FftSize::try_from(fft_size)?;
        let n = size.len();
        let guard_band_len = guard_band.unwrap_or_else(|| size.guard_band_len());
        let pilot_count = pilot_count.unwrap_or_else(|| size.default_pilot_count());

        let first = guard_band_len / 2;
        let last = n.saturating_sub(guard_band_len / 2);
        if guard_band_len == 0 || last >= n || first >= last {
            return Err(PhyError::InvalidConfiguration(format!(
                "guard band {} leaves no usable subcarriers for FFT size {}",
                guard_band_len, n
            )));
        }
        if pilot_count < 2 {
            return Err(PhyError::InvalidConfiguration(format!(
                "at least 2 pilots are required, got {}",
                pilot_count
            )));
        }

        let pilot_carriers = generate_pilot_carriers(n, guard_band_len, pilot_count)?;

        let center = n / 2;
        let active_carriers: Vec<usize> = (first..=last).filter(|&k| k != center).collect();
        let data_carriers: Vec<usize> = active_carriers
            .iter()
            .copied()
            .filter(|k| pilot_carriers.binary_search(k).is_err())
            .collect();
        if data_carriers.is_empty() {
            return Err(PhyError::InvalidConfiguration(format!(
                "guard band {} with {} pilots leaves no data subcarriers for FFT size {}",
                guard_band_len,
                pilot_carriers.len(),
                n
            )));
        }
        let pilot_positions: Vec<usize> = pilot_carriers
            .iter()
            .filter_map(|p| active_carriers.binary_search(p).ok())
            .collect();

        debug!(
            "Grid N={} CP={} guard={} pilots={} data carriers={}",
            n,
            size.cyclic_prefix_len(),
            guard_band_len,
            pilot_carriers.len(),
            data_carriers.len()
        );

        Ok(Self {
            fft_size: size,
            cyclic_prefix_len: size.cyclic_prefix_len(),
            guard_band_len,
            pilot_carriers,
            data_carriers,
            active_carriers,
            pilot_positions,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size.len()
    }

    pub fn fft_size_enum(&self) -> FftSize {
        self.fft_size
    }

    pub fn cyclic_prefix_len(&self) -> usize {
        self.cyclic_prefix_len
    }

    pub fn guard_band_len(&self) -> usize {
        self.guard_band_len
    }

    /// Samples per OFDM symbol including the cyclic prefix
    pub fn symbol_len(&self) -> usize {
        self.fft_size() + self.cyclic_prefix_len
    }

    /// Index of the DC subcarrier in the centered spectrum
    pub fn center(&self) -> usize {
        self.fft_size() / 2
    }

    /// Pilot subcarrier indices, strictly increasing
    pub fn pilot_carriers(&self) -> &[usize] {
        &self.pilot_carriers
    }

    pub fn pilot_value(&self) -> Sample {
        PILOT_VALUE
    }

    /// Ascending active subcarrier indices of the requested set
    pub fn active_carriers(&self, set: CarrierSet) -> &[usize] {
        match set {
            CarrierSet::Data => &self.data_carriers,
            CarrierSet::DataAndPilots => &self.active_carriers,
        }
    }

    /// Payload values carried by one data symbol
    pub fn data_carrier_count(&self) -> usize {
        self.data_carriers.len()
    }

    /// Width of a row selected with [`CarrierSet::DataAndPilots`]
    pub fn row_width(&self) -> usize {
        self.active_carriers.len()
    }

    /// Offsets of the pilots inside a [`CarrierSet::DataAndPilots`] row
    pub fn pilot_positions(&self) -> &[usize] {
        &self.pilot_positions
    }

    /// Sample rate at 15 kHz subcarrier spacing
    pub fn sample_rate(&self) -> f64 {
        SubcarrierSpacing::Scs15.sample_rate(self.fft_size)
    }
}

/// Place `pilot_count` pilots evenly over the usable band
///
/// The last pilot always sits on the upper band edge and the DC subcarrier is
/// never used.
fn generate_pilot_carriers(
    fft_size: usize,
    guard_band_len: usize,
    pilot_count: usize,
) -> Result<Vec<usize>, PhyError> {
    let center = fft_size / 2;
    let first = guard_band_len / 2;
    let last = fft_size - guard_band_len / 2;
    let spacing = (fft_size - guard_band_len) / (pilot_count - 1);

    if spacing == 0 {
        return Err(PhyError::InvalidConfiguration(format!(
            "{} pilots do not fit in {} usable subcarriers",
            pilot_count,
            fft_size - guard_band_len
        )));
    }

    let mut pilots: Vec<usize> = (first..=last)
        .step_by(spacing)
        .map(|k| if k == center { k + 1 } else { k })
        .collect();

    if pilots.len() < pilot_count {
        pilots.push(center + 1);
    } else {
        pilots.truncate(pilot_count);
    }
    if let Some(tail) = pilots.last_mut() {
        *tail = last;
    }

    let ordered = pilots.windows(2).all(|w| w[0] < w[1]);
    let in_band = pilots.iter().all(|&k| k >= first && k <= last && k != center);
    if !ordered || !in_band {
        return Err(PhyError::InvalidConfiguration(format!(
            "pilot layout {:?} is not strictly increasing inside [{}, {}]",
            pilots, first, last
        )));
    }

    Ok(pilots)
}
