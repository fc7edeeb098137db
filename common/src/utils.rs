//! Common Utilities
//!
//! Provides bit packing, the ASCII text codec and small sample statistics
//! used across the transceiver

use crate::types::Sample;
use tracing::trace;

/// Pack bits (0/1 values) into bytes, MSB first
///
/// A trailing partial byte is zero-filled on the right.
pub fn pack_bits(bits: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(bits.len().div_ceil(8));

    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            if bit & 1 != 0 {
                byte |= 1 << (7 - i);
            }
        }
        bytes.push(byte);
    }

    bytes
}

/// Unpack bytes into bits (MSB first)
pub fn unpack_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);

    for &byte in bytes {
        for i in 0..8 {
            bits.push((byte >> (7 - i)) & 1);
        }
    }

    bits
}

/// Encode text as an MSB-first bit stream of its bytes
pub fn text_to_bits(text: &str) -> Vec<u8> {
    unpack_bits(text.as_bytes())
}

/// Decode an MSB-first bit stream back into text
///
/// Trailing NUL bytes (zero padding added by the modulator) are dropped and
/// invalid UTF-8 is replaced rather than rejected.
pub fn bits_to_text(bits: &[u8]) -> String {
    let mut bytes = pack_bits(bits);
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    trace!("Decoding {} bits into {} bytes of text", bits.len(), bytes.len());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Round up to next power of 2
pub fn next_power_of_2(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    n.next_power_of_two()
}

/// Mean power of a sample sequence (0 for an empty slice)
pub fn mean_power(samples: &[Sample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.norm_sqr()).sum::<f64>() / samples.len() as f64
}

/// Largest magnitude in a sample sequence (0 for an empty slice)
pub fn peak_magnitude(samples: &[Sample]) -> f64 {
    samples.iter().map(|s| s.norm()).fold(0.0, f64::max)
}
