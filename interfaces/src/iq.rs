//! IQ sample buffers
//!
//! Buffer type exchanged with sample sources and sinks, and the cf32 wire
//! format (interleaved little-endian `f32` I/Q pairs) used by software radios.

use crate::InterfaceError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use common::types::Sample;

/// Size of one cf32 sample in bytes
pub const CF32_SAMPLE_SIZE: usize = 8;

/// IQ buffer for sample exchange
#[derive(Debug, Clone, PartialEq)]
pub struct IqBuffer {
    /// Complex samples
    pub samples: Vec<Sample>,
    /// Index of the first sample in the source stream
    pub timestamp: u64,
    /// Channel index
    pub channel: usize,
}

impl IqBuffer {
    /// Create a zeroed buffer
    pub fn new(size: usize, channel: usize) -> Self {
        Self {
            samples: vec![Sample::new(0.0, 0.0); size],
            timestamp: 0,
            channel,
        }
    }

    /// Create a buffer from samples
    pub fn from_samples(samples: Vec<Sample>, timestamp: u64, channel: usize) -> Self {
        Self {
            samples,
            timestamp,
            channel,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Something samples can be read from
pub trait SampleSource {
    /// Read up to `count` samples; an empty buffer means the source is drained
    fn receive(&mut self, count: usize) -> Result<IqBuffer, InterfaceError>;
}

/// Something samples can be written to
pub trait SampleSink {
    fn transmit(&mut self, samples: &[Sample]) -> Result<(), InterfaceError>;
}

/// Encode samples as cf32
pub fn samples_to_bytes(samples: &[Sample]) -> Bytes {
    let mut bytes = BytesMut::with_capacity(samples.len() * CF32_SAMPLE_SIZE);
    for sample in samples {
        bytes.put_f32_le(sample.re as f32);
        bytes.put_f32_le(sample.im as f32);
    }
    bytes.freeze()
}

/// Decode cf32 bytes into samples
pub fn bytes_to_samples(bytes: &[u8]) -> Result<Vec<Sample>, InterfaceError> {
    if bytes.len() % CF32_SAMPLE_SIZE != 0 {
        return Err(InterfaceError::InvalidSampleData(format!(
            "{} bytes is not a whole number of cf32 samples",
            bytes.len()
        )));
    }

    let mut reader = bytes;
    let mut samples = Vec::with_capacity(bytes.len() / CF32_SAMPLE_SIZE);
    while reader.has_remaining() {
        let re = reader.get_f32_le();
        let im = reader.get_f32_le();
        samples.push(Sample::new(re as f64, im as f64));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iq_buffer_serialization() {
        let buffer = IqBuffer::from_samples(
            vec![
                Sample::new(1.0, 0.0),
                Sample::new(0.0, 1.0),
                Sample::new(-1.0, 0.0),
                Sample::new(0.0, -32768.5),
            ],
            12345,
            0,
        );

        let bytes = samples_to_bytes(&buffer.samples);
        assert_eq!(bytes.len(), 32);
        // 1.0f32 little endian
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0x80, 0x3f]);

        let samples = bytes_to_samples(&bytes).unwrap();
        assert_eq!(samples, buffer.samples);
    }

    #[test]
    fn test_truncated_bytes_rejected() {
        let bytes = samples_to_bytes(&[Sample::new(0.5, 0.25)]);
        assert!(matches!(
            bytes_to_samples(&bytes[..7]),
            Err(InterfaceError::InvalidSampleData(_))
        ));
        assert!(bytes_to_samples(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_buffer_constructors() {
        let buffer = IqBuffer::new(16, 1);
        assert_eq!(buffer.len(), 16);
        assert_eq!(buffer.channel, 1);
        assert!(!buffer.is_empty());
        assert!(IqBuffer::from_samples(Vec::new(), 0, 0).is_empty());
    }
}
