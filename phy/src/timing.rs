//! Symbol Timing Synchronization
//!
//! Finds OFDM symbol boundaries in a received buffer, either blindly from the
//! cyclic prefix self-correlation or from the sync symbol cross-correlation.

use crate::config::{SyncDomain, SyncThresholds};
use crate::correlation::{fast_correlation, sliding_correlation};
use crate::grid::GridParameters;
use crate::observer::{NullObserver, TraceObserver};
use common::types::Sample;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Boundary search method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingStrategy {
    /// Cyclic prefix self-correlation over the whole buffer
    CyclicPrefix,
    /// Sync symbol cross-correlation in the given domain
    SyncSequence(SyncDomain),
}

/// Symbol timing synchronizer
pub struct TimingSynchronizer {
    grid: Arc<GridParameters>,
    /// Time-domain sync symbol body
    reference: Vec<Sample>,
    thresholds: SyncThresholds,
    observer: Arc<dyn TraceObserver>,
}

impl TimingSynchronizer {
    /// Create a synchronizer for the sync symbol body `reference`
    pub fn new(
        grid: Arc<GridParameters>,
        reference: Vec<Sample>,
        thresholds: SyncThresholds,
    ) -> Self {
        Self {
            grid,
            reference,
            thresholds,
            observer: Arc::new(NullObserver),
        }
    }

    /// Attach a diagnostic observer for the score traces
    pub fn with_observer(mut self, observer: Arc<dyn TraceObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn thresholds(&self) -> &SyncThresholds {
        &self.thresholds
    }

    /// Boundaries (CP starts) found with `strategy`, ascending
    pub fn boundaries(&self, buffer: &[Sample], strategy: TimingStrategy) -> Vec<usize> {
        match strategy {
            TimingStrategy::CyclicPrefix => self.cp_boundaries(buffer),
            TimingStrategy::SyncSequence(domain) => self.sync_boundaries(buffer, domain),
        }
    }

    /// Normalized CP self-correlation score for every offset
    ///
    /// Offset `i` compares the `cp_len` samples at `i` with those one FFT
    /// length later, reading the buffer circularly. Scores are scaled so the
    /// largest is 1.
    pub fn cp_scores(&self, buffer: &[Sample]) -> Vec<f64> {
        let n = self.grid.fft_size();
        let cp_len = self.grid.cyclic_prefix_len();
        let len = buffer.len();
        if len < self.grid.symbol_len() {
            return Vec::new();
        }

        let scores: Vec<f64> = (0..len)
            .map(|i| {
                let mut dot = Sample::new(0.0, 0.0);
                let mut energy_a = 0.0;
                let mut energy_b = 0.0;
                for k in 0..cp_len {
                    let a = buffer[(i + k) % len];
                    let b = buffer[(i + n + k) % len];
                    dot += a * b.conj();
                    energy_a += a.norm_sqr();
                    energy_b += b.norm_sqr();
                }
                let norm = (energy_a * energy_b).sqrt();
                if norm > 0.0 { dot.norm() / norm } else { 0.0 }
            })
            .collect();

        normalize_to_peak(scores)
    }

    /// Symbol boundaries from the CP self-correlation
    ///
    /// The scores are split into non-overlapping symbol-length windows; the
    /// first maximum of every window above `cp_peak` is a boundary when a full
    /// symbol fits after it.
    pub fn cp_boundaries(&self, buffer: &[Sample]) -> Vec<usize> {
        let scores = self.cp_scores(buffer);
        self.observer.observe_scores("cp_scores", &scores);
        if scores.is_empty() {
            return Vec::new();
        }

        let period = self.grid.symbol_len();
        let scan_len = if scores[0] > self.thresholds.cp_full_scan {
            scores.len()
        } else {
            scores.len().saturating_sub(period)
        };

        let mut boundaries = Vec::new();
        for start in (0..scan_len).step_by(period) {
            let end = (start + period).min(scores.len());
            let (offset, peak) = first_max(&scores[start..end]);
            if peak > self.thresholds.cp_peak {
                let index = start + offset;
                if index + period <= buffer.len() {
                    boundaries.push(index);
                }
            }
        }

        debug!("CP search found {} boundaries", boundaries.len());
        boundaries
    }

    /// CP boundaries of the part of `buffer` starting at `start`
    pub fn cp_boundaries_from(&self, buffer: &[Sample], start: usize) -> Vec<usize> {
        if start >= buffer.len() {
            return Vec::new();
        }
        self.cp_boundaries(&buffer[start..])
            .into_iter()
            .map(|b| b + start)
            .collect()
    }

    /// Sync reference correlation against every full-overlap offset, scaled
    /// so the largest is 1
    pub fn sync_scores(&self, buffer: &[Sample], domain: SyncDomain) -> Vec<f64> {
        let scores = match domain {
            SyncDomain::Time => sliding_correlation(buffer, &self.reference),
            SyncDomain::Frequency => fast_correlation(buffer, &self.reference),
        };
        normalize_to_peak(scores)
    }

    /// Start (CP included) of the first sync symbol in `buffer`
    ///
    /// Takes the first score over the domain threshold, refines to the peak
    /// of the run of scores above it and steps back over the cyclic prefix.
    pub fn find_frame_start(&self, buffer: &[Sample], domain: SyncDomain) -> Option<usize> {
        let scores = self.sync_scores(buffer, domain);
        self.observer.observe_scores("sync_scores", &scores);

        let threshold = match domain {
            SyncDomain::Time => self.thresholds.pss_time,
            SyncDomain::Frequency => self.thresholds.pss_frequency,
        };

        let first = scores.iter().position(|&s| s > threshold)?;
        let run = scores[first..]
            .iter()
            .position(|&s| s <= threshold)
            .map_or(scores.len(), |len| first + len);
        let (offset, peak) = first_max(&scores[first..run]);
        let body_start = first + offset;

        match body_start.checked_sub(self.grid.cyclic_prefix_len()) {
            Some(start) => {
                info!(
                    "Sync symbol detected at {} (body {}, score {:.3}, {:?} domain)",
                    start, body_start, peak, domain
                );
                Some(start)
            }
            None => {
                warn!(
                    "Sync peak at {} is closer to the buffer start than one cyclic prefix",
                    body_start
                );
                None
            }
        }
    }

    /// Whole symbol periods from the detected frame start
    pub fn sync_boundaries(&self, buffer: &[Sample], domain: SyncDomain) -> Vec<usize> {
        match self.find_frame_start(buffer, domain) {
            Some(start) => grid_boundaries(start, self.grid.symbol_len(), buffer.len()),
            None => Vec::new(),
        }
    }
}

/// `start + k * period` for every symbol that fits completely in `len`
pub fn grid_boundaries(start: usize, period: usize, len: usize) -> Vec<usize> {
    if period == 0 {
        return Vec::new();
    }
    (start..)
        .step_by(period)
        .take_while(|b| b + period <= len)
        .collect()
}

fn normalize_to_peak(mut scores: Vec<f64>) -> Vec<f64> {
    let peak = scores.iter().copied().fold(0.0, f64::max);
    if peak > 0.0 {
        for score in scores.iter_mut() {
            *score /= peak;
        }
    }
    scores
}

/// Offset and value of the earliest maximum
fn first_max(scores: &[f64]) -> (usize, f64) {
    scores
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, &s)| if s > best.1 { (i, s) } else { best })
}
