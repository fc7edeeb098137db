//! Diagnostic observers
//!
//! Receive stages hand intermediate signals to an injected observer instead
//! of plotting them.

use common::types::Sample;
use common::utils::{mean_power, peak_magnitude};
use tracing::trace;

/// Sink for intermediate signals of the receive chain
pub trait TraceObserver: Send + Sync {
    /// Called with a labelled complex signal
    fn observe(&self, label: &str, samples: &[Sample]);

    /// Called with a labelled real-valued score trace
    fn observe_scores(&self, _label: &str, _scores: &[f64]) {}
}

/// Observer that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl TraceObserver for NullObserver {
    fn observe(&self, _label: &str, _samples: &[Sample]) {}
}

/// Observer that summarizes each signal as a trace event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TraceObserver for TracingObserver {
    fn observe(&self, label: &str, samples: &[Sample]) {
        trace!(
            "{}: {} samples, mean power {:.4e}, peak {:.4e}",
            label,
            samples.len(),
            mean_power(samples),
            peak_magnitude(samples)
        );
    }

    fn observe_scores(&self, label: &str, scores: &[f64]) {
        let (argmax, max) = scores
            .iter()
            .enumerate()
            .fold((0, 0.0), |best, (i, &s)| if s > best.1 { (i, s) } else { best });
        trace!("{}: {} scores, max {:.4} at {}", label, scores.len(), max, argmax);
    }
}
