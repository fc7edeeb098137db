//! Text to waveform and back
//!
//! Glue between the text codec, the constellation mapper, the OFDM engine and
//! the sample interfaces.

use crate::config::TrxConfig;
use anyhow::{Context, Result};
use common::types::Sample;
use common::utils::{bits_to_text, text_to_bits};
use interfaces::{LoopbackChannel, SampleSink, SampleSource};
use phy::{NullObserver, OfdmModulator, OfdmReceiver, TraceObserver, TracingObserver};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Summary of one run, printed as text or JSON
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: String,
    pub fft_size: usize,
    pub samples: usize,
    pub frame_start: Option<usize>,
    pub frequency_offset_hz: Option<f64>,
    pub symbols: usize,
    pub text: Option<String>,
}

/// Modulated waveform of `text`
pub fn encode_text(config: &TrxConfig, text: &str) -> Result<Vec<Sample>> {
    let grid = config.ofdm.grid().context("Invalid grid configuration")?;
    let modulator = OfdmModulator::new(grid, &config.ofdm);

    let bits = text_to_bits(text);
    let symbols = config.modulation.map(&bits);
    let samples = modulator.modulate_flat(&symbols);

    info!(
        "Encoded {} characters into {} symbols, {} samples",
        text.chars().count(),
        symbols.len(),
        samples.len()
    );
    Ok(samples)
}

/// Number of slots the waveform of `text` occupies
pub fn slot_count(config: &TrxConfig, text: &str) -> Result<usize> {
    let grid = config.ofdm.grid()?;
    let modulator = OfdmModulator::new(grid, &config.ofdm);
    let symbols = text_to_bits(text).len().div_ceil(config.modulation.bits_per_symbol());
    Ok(modulator.symbol_count(symbols) / phy::SYMBOLS_PER_SLOT)
}

/// Receive and decode the first frame in `samples`
pub fn decode_samples(config: &TrxConfig, samples: &[Sample]) -> Result<RunReport> {
    let observer: Arc<dyn TraceObserver> = if tracing::enabled!(tracing::Level::TRACE) {
        Arc::new(TracingObserver)
    } else {
        Arc::new(NullObserver)
    };
    let receiver = OfdmReceiver::from_config(&config.ofdm)
        .context("Invalid receiver configuration")?
        .with_observer(observer);

    let reception = receiver.receive(samples)?;
    let text = if reception.is_detected() {
        // back from the equalizer radius to the unit constellation
        let grid = receiver.grid();
        let scale = grid.pilot_value().norm() / config.ofdm.equalizer.constellation_radius;
        let symbols: Vec<Sample> = reception.symbols.iter().map(|s| s * scale).collect();
        Some(bits_to_text(&config.modulation.demap(&symbols)))
    } else {
        warn!("No frame detected");
        None
    };

    Ok(RunReport {
        mode: String::new(),
        fft_size: config.ofdm.fft_size.len(),
        samples: samples.len(),
        frame_start: reception.frame_start,
        frequency_offset_hz: reception.frequency_offset_hz,
        symbols: reception.symbols.len(),
        text,
    })
}

/// Send `text` through a simulated channel and decode it again
pub fn run_loopback(config: &TrxConfig, text: &str) -> Result<RunReport> {
    let grid = config.ofdm.grid()?;
    let mut impairments = config.channel;
    impairments.sample_rate = grid.sample_rate();

    let mut channel = LoopbackChannel::new(impairments)?;
    let waveform = encode_text(config, text)?;
    channel.transmit(&waveform)?;
    channel.idle(grid.symbol_len());

    let received = channel.receive(channel.pending())?;

    let mut rx_config = config.clone();
    rx_config.ofdm.receiver.max_slots = Some(slot_count(config, text)?);
    let mut report = decode_samples(&rx_config, &received.samples)?;
    report.mode = "loopback".to_string();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::FftSize;
    use interfaces::{read_cf32_file, write_cf32_file};
    use phy::{Modulation, SyncDomain};

    const MESSAGE: &str = "The quick brown fox jumps over the lazy dog";

    #[test]
    fn test_encode_decode_clean() {
        let config = TrxConfig::default();
        let samples = encode_text(&config, MESSAGE).unwrap();
        let report = decode_samples(&config, &samples).unwrap();

        assert_eq!(report.frame_start, Some(0));
        assert_eq!(report.text.as_deref(), Some(MESSAGE));
    }

    #[test]
    fn test_loopback_with_impairments() {
        let mut config = TrxConfig::default();
        config.channel.delay_samples = 517;
        config.channel.frequency_offset_hz = 420.0;
        config.channel.gain = 0.01;
        config.channel.noise_std = 0.5;
        config.channel.seed = 3;

        let report = run_loopback(&config, MESSAGE).unwrap();
        assert_eq!(report.frame_start, Some(517));
        assert_eq!(report.text.as_deref(), Some(MESSAGE));
        assert!(report.frequency_offset_hz.is_some());
    }

    #[test]
    fn test_loopback_qam16_frequency_sync() {
        let mut config = TrxConfig::default();
        config.ofdm.fft_size = FftSize::Fft256;
        config.ofdm.receiver.sync_domain = SyncDomain::Frequency;
        config.modulation = Modulation::Qam16;
        config.channel.delay_samples = 1200;
        config.channel.noise_std = 1.0;

        let report = run_loopback(&config, MESSAGE).unwrap();
        assert_eq!(report.frame_start, Some(1200));
        assert_eq!(report.text.as_deref(), Some(MESSAGE));
    }

    #[test]
    fn test_loopback_qam64() {
        let mut config = TrxConfig::default();
        config.modulation = Modulation::Qam64;
        config.ofdm.equalizer.max_magnitude = 1.8;
        config.channel.delay_samples = 300;
        config.channel.noise_std = 1.0;
        config.channel.seed = 11;
        config.validate().unwrap();

        let report = run_loopback(&config, MESSAGE).unwrap();
        assert_eq!(report.frame_start, Some(300));
        assert_eq!(report.text.as_deref(), Some(MESSAGE));
    }

    #[test]
    fn test_multi_slot_message() {
        let config = TrxConfig::default();
        let text = MESSAGE.repeat(3);
        assert_eq!(slot_count(&config, &text).unwrap(), 2);

        let report = run_loopback(&config, &text).unwrap();
        assert_eq!(report.text.as_deref(), Some(text.as_str()));
    }

    #[test]
    fn test_file_transmit_receive() {
        let config = TrxConfig::default();
        let path = std::env::temp_dir().join(format!("ofdm-trx-pipeline-{}.cf32", std::process::id()));

        write_cf32_file(&path, &encode_text(&config, "hello").unwrap()).unwrap();
        let samples = read_cf32_file(&path).unwrap();
        let report = decode_samples(&config, &samples).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(report.text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_silence_is_not_a_frame() {
        let config = TrxConfig::default();
        let report = decode_samples(&config, &vec![Sample::new(0.0, 0.0); 1000]).unwrap();
        assert!(report.frame_start.is_none());
        assert!(report.text.is_none());
    }
}
