//! Correlation primitives
//!
//! Zero-lag correlation of two equal-length sequences plus the sliding
//! variants used by the timing search.

use crate::dft::OfdmTransform;
use crate::PhyError;
use common::types::Sample;
use common::utils::next_power_of_2;

/// How the two sequences are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationMode {
    /// `Σ a·conj(b)`
    Coherent,
    /// Real and imaginary parts correlated independently
    SplitQuadrature,
}

/// Zero-lag correlation of two equal-length sequences
///
/// With `normalized` set the coherent result is divided by `‖a‖·‖b‖` and each
/// split-quadrature component by its own component norms. A zero norm yields
/// zero.
pub fn correlate(
    a: &[Sample],
    b: &[Sample],
    normalized: bool,
    mode: CorrelationMode,
) -> Result<Sample, PhyError> {
    if a.len() != b.len() {
        return Err(PhyError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let value = match mode {
        CorrelationMode::Coherent => {
            let dot: Sample = a.iter().zip(b).map(|(x, y)| x * y.conj()).sum();
            if normalized {
                let norm = energy(a).sqrt() * energy(b).sqrt();
                if norm > 0.0 { dot / norm } else { Sample::new(0.0, 0.0) }
            } else {
                dot
            }
        }
        CorrelationMode::SplitQuadrature => {
            let re: f64 = a.iter().zip(b).map(|(x, y)| x.re * y.re).sum();
            let im: f64 = a.iter().zip(b).map(|(x, y)| x.im * y.im).sum();
            if normalized {
                let re_norm = component_norm(a, |s| s.re) * component_norm(b, |s| s.re);
                let im_norm = component_norm(a, |s| s.im) * component_norm(b, |s| s.im);
                Sample::new(safe_div(re, re_norm), safe_div(im, im_norm))
            } else {
                Sample::new(re, im)
            }
        }
    };

    Ok(value)
}

/// Normalized correlation magnitude of `reference` against every offset of
/// `signal` where it fits completely
pub fn sliding_correlation(signal: &[Sample], reference: &[Sample]) -> Vec<f64> {
    let len = reference.len();
    if len == 0 || signal.len() < len {
        return Vec::new();
    }
    let ref_norm = energy(reference).sqrt();

    signal
        .windows(len)
        .map(|window| {
            let dot: Sample = window.iter().zip(reference).map(|(x, y)| x * y.conj()).sum();
            let norm = energy(window).sqrt() * ref_norm;
            if norm > 0.0 { dot.norm() / norm } else { 0.0 }
        })
        .collect()
}

/// Unnormalized correlation magnitude at every full-overlap offset, computed
/// through the frequency domain
pub fn fast_correlation(signal: &[Sample], reference: &[Sample]) -> Vec<f64> {
    let len = reference.len();
    if len == 0 || signal.len() < len {
        return Vec::new();
    }

    let size = next_power_of_2(signal.len() + len - 1);
    let transform = OfdmTransform::new(size);

    let mut x = vec![Sample::new(0.0, 0.0); size];
    x[..signal.len()].copy_from_slice(signal);
    let mut r = vec![Sample::new(0.0, 0.0); size];
    r[..len].copy_from_slice(reference);

    transform.forward_in_place(&mut x);
    transform.forward_in_place(&mut r);
    for (xi, ri) in x.iter_mut().zip(&r) {
        *xi *= ri.conj();
    }
    transform.inverse_in_place(&mut x);

    let scale = 1.0 / size as f64;
    x[..=signal.len() - len]
        .iter()
        .map(|c| c.norm() * scale)
        .collect()
}

fn energy(samples: &[Sample]) -> f64 {
    samples.iter().map(|s| s.norm_sqr()).sum()
}

fn component_norm(samples: &[Sample], part: impl Fn(&Sample) -> f64) -> f64 {
    samples.iter().map(|s| part(s).powi(2)).sum::<f64>().sqrt()
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<Sample> {
        (0..len)
            .map(|n| Sample::from_polar(1.0 + n as f64 * 0.1, n as f64 * 0.7))
            .collect()
    }

    #[test]
    fn test_coherent_self_correlation() {
        let a = ramp(32);
        let c = correlate(&a, &a, true, CorrelationMode::Coherent).unwrap();
        assert!((c - Sample::new(1.0, 0.0)).norm() < 1e-12);

        // a rotated copy keeps magnitude 1 and reports the rotation
        let rotated: Vec<Sample> = a.iter().map(|s| s * Sample::from_polar(1.0, 0.3)).collect();
        let c = correlate(&rotated, &a, true, CorrelationMode::Coherent).unwrap();
        assert!((c.norm() - 1.0).abs() < 1e-12);
        assert!((c.arg() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_split_quadrature() {
        let a = vec![Sample::new(1.0, 2.0), Sample::new(-1.0, 1.0)];
        let c = correlate(&a, &a, true, CorrelationMode::SplitQuadrature).unwrap();
        assert!((c - Sample::new(1.0, 1.0)).norm() < 1e-12);

        let raw = correlate(&a, &a, false, CorrelationMode::SplitQuadrature).unwrap();
        assert_eq!(raw, Sample::new(2.0, 5.0));
    }

    #[test]
    fn test_zero_norm_yields_zero() {
        let zeros = vec![Sample::new(0.0, 0.0); 4];
        let a = ramp(4);
        let c = correlate(&zeros, &a, true, CorrelationMode::Coherent).unwrap();
        assert_eq!(c, Sample::new(0.0, 0.0));

        let real_only = vec![Sample::new(1.0, 0.0); 4];
        let c = correlate(&real_only, &real_only, true, CorrelationMode::SplitQuadrature).unwrap();
        assert_eq!(c, Sample::new(1.0, 0.0));
    }

    #[test]
    fn test_length_mismatch() {
        let result = correlate(&ramp(3), &ramp(4), true, CorrelationMode::Coherent);
        assert!(matches!(result, Err(PhyError::LengthMismatch { left: 3, right: 4 })));
    }

    #[test]
    fn test_sliding_and_fast_agree_on_peak() {
        let reference = ramp(16);
        let mut signal = vec![Sample::new(0.01, -0.02); 100];
        signal[37..53].copy_from_slice(&reference);

        let slow = sliding_correlation(&signal, &reference);
        let fast = fast_correlation(&signal, &reference);
        assert_eq!(slow.len(), 85);
        assert_eq!(fast.len(), 85);

        let argmax = |v: &[f64]| {
            v.iter()
                .enumerate()
                .fold((0, f64::MIN), |best, (i, &x)| if x > best.1 { (i, x) } else { best })
                .0
        };
        assert_eq!(argmax(&slow), 37);
        assert_eq!(argmax(&fast), 37);
        assert!((slow[37] - 1.0).abs() < 1e-12);

        let expected = energy(&reference);
        assert!((fast[37] - expected).abs() < 1e-9 * expected);
    }
}
