//! Simulated loopback channel
//!
//! An in-memory sink and source pair. Transmitted samples pass through a
//! delay, a gain, a carrier frequency offset and additive white Gaussian
//! noise before they become available to `receive`.

use crate::iq::{IqBuffer, SampleSink, SampleSource};
use crate::InterfaceError;
use common::types::Sample;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::PI;
use tracing::debug;

/// Channel impairments applied by [`LoopbackChannel`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelImpairments {
    /// Noise-only samples emitted before the first transmitted sample
    pub delay_samples: usize,
    /// Carrier frequency offset in Hz
    pub frequency_offset_hz: f64,
    /// Sample rate used to turn the offset into a phase ramp
    pub sample_rate: f64,
    /// Linear amplitude gain
    pub gain: f64,
    /// Standard deviation of each I/Q noise component
    pub noise_std: f64,
    /// Seed of the noise generator
    pub seed: u64,
}

impl Default for ChannelImpairments {
    fn default() -> Self {
        Self {
            delay_samples: 0,
            frequency_offset_hz: 0.0,
            sample_rate: 1_920_000.0,
            gain: 1.0,
            noise_std: 0.0,
            seed: 0,
        }
    }
}

impl ChannelImpairments {
    pub fn validate(&self) -> Result<(), InterfaceError> {
        if !(self.sample_rate > 0.0) {
            return Err(InterfaceError::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.noise_std < 0.0 {
            return Err(InterfaceError::InvalidConfig(format!(
                "noise standard deviation must not be negative, got {}",
                self.noise_std
            )));
        }
        Ok(())
    }
}

/// In-memory channel between a transmitter and a receiver
pub struct LoopbackChannel {
    impairments: ChannelImpairments,
    rng: StdRng,
    queue: VecDeque<Sample>,
    /// Samples emitted into the queue so far, drives the CFO phase
    emitted: u64,
    /// Samples handed out by `receive`
    received: u64,
}

impl LoopbackChannel {
    pub fn new(impairments: ChannelImpairments) -> Result<Self, InterfaceError> {
        impairments.validate()?;
        let mut channel = Self {
            impairments,
            rng: StdRng::seed_from_u64(impairments.seed),
            queue: VecDeque::new(),
            emitted: 0,
            received: 0,
        };
        let silence = vec![Sample::new(0.0, 0.0); impairments.delay_samples];
        channel.push(&silence, 0.0);
        Ok(channel)
    }

    pub fn impairments(&self) -> &ChannelImpairments {
        &self.impairments
    }

    /// Samples waiting to be received
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Append `trailing` noise-only samples, e.g. to let a receiver see the
    /// end of a burst
    pub fn idle(&mut self, trailing: usize) {
        let silence = vec![Sample::new(0.0, 0.0); trailing];
        self.push(&silence, 0.0);
    }

    /// Receive everything currently queued
    pub fn drain(&mut self) -> IqBuffer {
        let count = self.queue.len();
        self.take(count)
    }

    fn push(&mut self, samples: &[Sample], gain: f64) {
        let step = 2.0 * PI * self.impairments.frequency_offset_hz / self.impairments.sample_rate;
        for &sample in samples {
            let rotation = Sample::from_polar(1.0, step * self.emitted as f64);
            let noise = self.noise();
            self.queue.push_back(sample * gain * rotation + noise);
            self.emitted += 1;
        }
    }

    /// Complex Gaussian sample via Box-Muller
    fn noise(&mut self) -> Sample {
        let std = self.impairments.noise_std;
        if std == 0.0 {
            return Sample::new(0.0, 0.0);
        }
        let u1: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        let u2: f64 = self.rng.gen();
        let radius = (-2.0 * u1.ln()).sqrt() * std;
        Sample::from_polar(radius, 2.0 * PI * u2)
    }

    fn take(&mut self, count: usize) -> IqBuffer {
        let count = count.min(self.queue.len());
        let samples: Vec<Sample> = self.queue.drain(..count).collect();
        let buffer = IqBuffer::from_samples(samples, self.received, 0);
        self.received += count as u64;
        buffer
    }
}

impl SampleSink for LoopbackChannel {
    fn transmit(&mut self, samples: &[Sample]) -> Result<(), InterfaceError> {
        let gain = self.impairments.gain;
        self.push(samples, gain);
        debug!("Loopback queued {} samples ({} pending)", samples.len(), self.queue.len());
        Ok(())
    }
}

impl SampleSource for LoopbackChannel {
    fn receive(&mut self, count: usize) -> Result<IqBuffer, InterfaceError> {
        Ok(self.take(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<Sample> {
        (0..len).map(|i| Sample::new(i as f64 + 1.0, 0.5)).collect()
    }

    #[test]
    fn test_ideal_channel_with_delay() {
        let impairments = ChannelImpairments {
            delay_samples: 5,
            ..Default::default()
        };
        let mut channel = LoopbackChannel::new(impairments).unwrap();
        let samples = ramp(10);
        channel.transmit(&samples).unwrap();
        assert_eq!(channel.pending(), 15);

        let head = channel.receive(5).unwrap();
        assert!(head.samples.iter().all(|s| s.norm() == 0.0));
        let body = channel.receive(100).unwrap();
        assert_eq!(body.timestamp, 5);
        assert_eq!(body.samples, samples);
        assert!(channel.receive(1).unwrap().is_empty());
    }

    #[test]
    fn test_gain_and_frequency_offset() {
        let impairments = ChannelImpairments {
            frequency_offset_hz: 1000.0,
            sample_rate: 8000.0,
            gain: 0.5,
            ..Default::default()
        };
        let mut channel = LoopbackChannel::new(impairments).unwrap();
        channel.transmit(&vec![Sample::new(2.0, 0.0); 8]).unwrap();

        let rx = channel.drain().samples;
        for (n, s) in rx.iter().enumerate() {
            let expected = Sample::from_polar(1.0, 2.0 * PI * n as f64 / 8.0);
            assert!((s - expected).norm() < 1e-12);
        }
    }

    #[test]
    fn test_noise_is_seeded() {
        let impairments = ChannelImpairments {
            noise_std: 0.1,
            seed: 42,
            ..Default::default()
        };
        let mut a = LoopbackChannel::new(impairments).unwrap();
        let mut b = LoopbackChannel::new(impairments).unwrap();
        a.idle(2000);
        b.idle(2000);

        let noise_a = a.drain().samples;
        assert_eq!(noise_a, b.drain().samples);

        // each component has variance std^2
        let power = noise_a.iter().map(|s| s.norm_sqr()).sum::<f64>() / noise_a.len() as f64;
        assert!((power - 0.02).abs() < 0.004, "power {}", power);
    }

    #[test]
    fn test_invalid_impairments() {
        let impairments = ChannelImpairments {
            sample_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            LoopbackChannel::new(impairments),
            Err(InterfaceError::InvalidConfig(_))
        ));
    }
}
