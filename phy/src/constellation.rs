//! Constellation mapping
//!
//! Bit to symbol mapping for BPSK, QPSK, 16-QAM and 64-QAM with unit average
//! energy. The first bit of each group selects the sign of the real part, the
//! second the sign of the imaginary part. 16-QAM uses the remaining two bits
//! for the inner/outer level per axis; 64-QAM follows the 3GPP TS 38.211
//! layout, where bits 2/3 pick the inner or outer half and bits 4/5 the level
//! inside it.

use common::types::Sample;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_1_SQRT_2;

/// 1/sqrt(10), the 16-QAM normalization
const QAM16_SCALE: f64 = 0.316_227_766_016_837_94;

/// 1/sqrt(42), the 64-QAM normalization
const QAM64_SCALE: f64 = 0.154_303_349_962_091_9;

/// Largest group size over all schemes
const MAX_BITS_PER_SYMBOL: usize = 6;

/// Supported modulation schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modulation {
    Bpsk,
    Qpsk,
    Qam16,
    Qam64,
}

impl Modulation {
    pub fn bits_per_symbol(&self) -> usize {
        match self {
            Modulation::Bpsk => 1,
            Modulation::Qpsk => 2,
            Modulation::Qam16 => 4,
            Modulation::Qam64 => 6,
        }
    }

    /// Map bits (0/1 values) to symbols; a partial trailing group is
    /// zero-filled
    pub fn map(&self, bits: &[u8]) -> Vec<Sample> {
        bits.chunks(self.bits_per_symbol())
            .map(|chunk| {
                let mut group = [0u8; MAX_BITS_PER_SYMBOL];
                for (dst, &bit) in group.iter_mut().zip(chunk) {
                    *dst = bit & 1;
                }
                self.map_group(&group)
            })
            .collect()
    }

    /// Hard-decision demapping of symbols at unit average energy
    pub fn demap(&self, symbols: &[Sample]) -> Vec<u8> {
        let mut bits = Vec::with_capacity(symbols.len() * self.bits_per_symbol());
        for s in symbols {
            match self {
                Modulation::Bpsk => bits.push(sign_bit(s.re)),
                Modulation::Qpsk => {
                    bits.push(sign_bit(s.re));
                    bits.push(sign_bit(s.im));
                }
                Modulation::Qam16 => {
                    let threshold = 2.0 * QAM16_SCALE;
                    bits.push(sign_bit(s.re));
                    bits.push(sign_bit(s.im));
                    bits.push((s.re.abs() > threshold) as u8);
                    bits.push((s.im.abs() > threshold) as u8);
                }
                Modulation::Qam64 => {
                    let re = s.re.abs() / QAM64_SCALE;
                    let im = s.im.abs() / QAM64_SCALE;
                    bits.push(sign_bit(s.re));
                    bits.push(sign_bit(s.im));
                    bits.push((re > 4.0) as u8);
                    bits.push((im > 4.0) as u8);
                    bits.push(((re - 4.0).abs() > 2.0) as u8);
                    bits.push(((im - 4.0).abs() > 2.0) as u8);
                }
            }
        }
        bits
    }

    /// Largest symbol magnitude of the constellation
    pub fn peak_magnitude(&self) -> f64 {
        match self {
            Modulation::Bpsk | Modulation::Qpsk => 1.0,
            Modulation::Qam16 => 3.0 * std::f64::consts::SQRT_2 * QAM16_SCALE,
            Modulation::Qam64 => 7.0 * std::f64::consts::SQRT_2 * QAM64_SCALE,
        }
    }

    /// Smallest symbol magnitude of the constellation
    pub fn min_magnitude(&self) -> f64 {
        match self {
            Modulation::Bpsk | Modulation::Qpsk => 1.0,
            Modulation::Qam16 => std::f64::consts::SQRT_2 * QAM16_SCALE,
            Modulation::Qam64 => std::f64::consts::SQRT_2 * QAM64_SCALE,
        }
    }

    fn map_group(&self, group: &[u8; MAX_BITS_PER_SYMBOL]) -> Sample {
        let sign = |bit: u8| if bit == 0 { 1.0 } else { -1.0 };
        match self {
            Modulation::Bpsk => Sample::new(sign(group[0]), 0.0),
            Modulation::Qpsk => {
                Sample::new(sign(group[0]), sign(group[1])) * FRAC_1_SQRT_2
            }
            Modulation::Qam16 => {
                let level = |bit: u8| if bit == 0 { 1.0 } else { 3.0 };
                Sample::new(
                    sign(group[0]) * level(group[2]),
                    sign(group[1]) * level(group[3]),
                ) * QAM16_SCALE
            }
            Modulation::Qam64 => {
                let level = |half: u8, fine: u8| 4.0 - sign(half) * (2.0 - sign(fine));
                Sample::new(
                    sign(group[0]) * level(group[2], group[4]),
                    sign(group[1]) * level(group[3], group[5]),
                ) * QAM64_SCALE
            }
        }
    }
}

fn sign_bit(value: f64) -> u8 {
    (value < 0.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const ALL: [Modulation; 4] = [
        Modulation::Bpsk,
        Modulation::Qpsk,
        Modulation::Qam16,
        Modulation::Qam64,
    ];

    fn random_bits(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen_range(0..2u8)).collect()
    }

    #[test]
    fn test_map_demap_recovers_bits() {
        for (i, modulation) in ALL.into_iter().enumerate() {
            let bits = random_bits(480, i as u64);
            let symbols = modulation.map(&bits);
            assert_eq!(symbols.len(), 480 / modulation.bits_per_symbol());
            assert_eq!(modulation.demap(&symbols), bits);
        }
    }

    #[test]
    fn test_unit_average_energy() {
        for modulation in ALL {
            let n = modulation.bits_per_symbol();
            // every point exactly once
            let bits: Vec<u8> = (0..1u32 << n)
                .flat_map(|v| (0..n).rev().map(move |b| ((v >> b) & 1) as u8))
                .collect();
            let symbols = modulation.map(&bits);
            let energy = symbols.iter().map(|s| s.norm_sqr()).sum::<f64>() / symbols.len() as f64;
            assert!((energy - 1.0).abs() < 1e-12, "{:?}", modulation);

            let peak = symbols.iter().map(|s| s.norm()).fold(0.0, f64::max);
            assert!((peak - modulation.peak_magnitude()).abs() < 1e-12);
            let min = symbols.iter().map(|s| s.norm()).fold(f64::MAX, f64::min);
            assert!((min - modulation.min_magnitude()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_qam16_points() {
        let symbols = Modulation::Qam16.map(&[0, 0, 0, 0, 1, 1, 1, 1, 0, 1, 1, 0]);
        assert!((symbols[0] - Sample::new(1.0, 1.0) * QAM16_SCALE).norm() < 1e-12);
        assert!((symbols[1] - Sample::new(-3.0, -3.0) * QAM16_SCALE).norm() < 1e-12);
        assert!((symbols[2] - Sample::new(3.0, -1.0) * QAM16_SCALE).norm() < 1e-12);
    }

    #[test]
    fn test_qam64_points() {
        let bits = [
            0, 0, 0, 0, 0, 0, //
            0, 0, 0, 0, 0, 1, //
            0, 0, 1, 0, 1, 0, //
            0, 1, 0, 1, 0, 1, //
            1, 1, 1, 1, 1, 1, //
        ];
        let expected = [
            Sample::new(3.0, 3.0),
            Sample::new(3.0, 1.0),
            Sample::new(7.0, 3.0),
            Sample::new(3.0, -7.0),
            Sample::new(-7.0, -7.0),
        ];
        let symbols = Modulation::Qam64.map(&bits);
        for (s, e) in symbols.iter().zip(expected) {
            assert!((s - e * QAM64_SCALE).norm() < 1e-12, "{} vs {}", s, e);
        }
    }

    #[test]
    fn test_qam64_demap_with_noise() {
        let bits = random_bits(600, 9);
        let mut rng = StdRng::seed_from_u64(10);
        let symbols: Vec<Sample> = Modulation::Qam64
            .map(&bits)
            .into_iter()
            .map(|s| {
                // less than half the decision distance on each axis
                let jitter = 0.9 * QAM64_SCALE;
                s + Sample::new(rng.gen_range(-jitter..jitter), rng.gen_range(-jitter..jitter))
            })
            .collect();
        assert_eq!(Modulation::Qam64.demap(&symbols), bits);
    }

    #[test]
    fn test_serde_names() {
        let names: Vec<String> = ALL
            .iter()
            .map(|m| serde_json::to_string(m).unwrap())
            .collect();
        assert_eq!(names, ["\"bpsk\"", "\"qpsk\"", "\"qam16\"", "\"qam64\""]);
    }

    #[test]
    fn test_partial_group_zero_filled() {
        let symbols = Modulation::Qpsk.map(&[1, 0, 1]);
        assert_eq!(symbols.len(), 2);
        assert_eq!(Modulation::Qpsk.demap(&symbols), vec![1, 0, 1, 0]);
    }
}
