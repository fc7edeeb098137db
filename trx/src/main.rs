//! OFDM Transceiver Main Application
//!
//! Command line front-end for the OFDM engine: writes text as a cf32
//! waveform, decodes a cf32 recording, or runs both through a simulated
//! channel.

mod config;
mod pipeline;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use common::types::FftSize;
use config::TrxConfig;
use interfaces::{IqFileSink, IqFileSource, SampleSink, SampleSource};
use pipeline::RunReport;

/// OFDM transceiver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML or TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the file
    #[arg(short, long)]
    log_level: Option<String>,

    /// FFT size (64, 128, 256, 512, 1024, 2048)
    #[arg(long)]
    fft_size: Option<usize>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Modulate text into a cf32 file
    Transmit {
        /// Message to send
        #[arg(short, long)]
        text: String,

        /// Output cf32 file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decode the first frame of a cf32 file
    Receive {
        /// Input cf32 file
        #[arg(short, long)]
        input: PathBuf,

        /// Demodulate at most this many slots
        #[arg(long)]
        slots: Option<usize>,
    },

    /// Send text through the simulated channel and decode it
    Loopback {
        /// Message to send
        #[arg(short, long)]
        text: String,

        /// Channel delay in samples
        #[arg(long)]
        delay: Option<usize>,

        /// Carrier frequency offset in Hz
        #[arg(long)]
        cfo: Option<f64>,

        /// Noise standard deviation per I/Q component
        #[arg(long)]
        noise: Option<f64>,

        /// Noise generator seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TrxConfig::from_file(path)?,
        None => TrxConfig::default(),
    };
    if let Some(size) = args.fft_size {
        config.ofdm.fft_size = FftSize::try_from(size)?;
    }
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting OFDM transceiver");
    if let Some(path) = &args.config {
        info!("Configuration file: {}", path.display());
    }
    info!("OFDM configuration:");
    info!("  FFT size: {}", config.ofdm.fft_size.len());
    info!("  Modulation: {:?}", config.modulation);
    info!("  Sync domain: {:?}", config.ofdm.receiver.sync_domain);
    info!("  Boundary strategy: {:?}", config.ofdm.receiver.boundary_strategy);
    config.validate()?;

    let report = match args.command {
        Command::Transmit { text, output } => {
            let samples = pipeline::encode_text(&config, &text)?;
            let mut sink = IqFileSink::create(&output)
                .with_context(|| format!("Cannot create {}", output.display()))?;
            sink.transmit(&samples)?;
            sink.flush()?;
            info!("Wrote {} samples to {}", sink.written(), output.display());

            RunReport {
                mode: "transmit".to_string(),
                fft_size: config.ofdm.fft_size.len(),
                samples: samples.len(),
                frame_start: None,
                frequency_offset_hz: None,
                symbols: 0,
                text: Some(text),
            }
        }
        Command::Receive { input, slots } => {
            let mut source = IqFileSource::open(&input)
                .with_context(|| format!("Cannot read {}", input.display()))?;
            let buffer = source.receive(source.remaining())?;

            if slots.is_some() {
                config.ofdm.receiver.max_slots = slots;
            }
            let mut report = pipeline::decode_samples(&config, &buffer.samples)?;
            report.mode = "receive".to_string();
            report
        }
        Command::Loopback { text, delay, cfo, noise, seed } => {
            if let Some(delay) = delay {
                config.channel.delay_samples = delay;
            }
            if let Some(cfo) = cfo {
                config.channel.frequency_offset_hz = cfo;
            }
            if let Some(noise) = noise {
                config.channel.noise_std = noise;
            }
            if let Some(seed) = seed {
                config.channel.seed = seed;
            }
            pipeline::run_loopback(&config, &text)?
        }
    };

    print_report(&report, args.json)?;
    Ok(())
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("mode:         {}", report.mode);
    println!("fft size:     {}", report.fft_size);
    println!("samples:      {}", report.samples);
    if let Some(start) = report.frame_start {
        println!("frame start:  {}", start);
    }
    if let Some(offset) = report.frequency_offset_hz {
        println!("cfo:          {:.2} Hz", offset);
    }
    if report.symbols > 0 {
        println!("symbols:      {}", report.symbols);
    }
    match &report.text {
        Some(text) => println!("text:         {}", text),
        None => println!("text:         <no frame detected>"),
    }
    Ok(())
}
