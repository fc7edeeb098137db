//! Sample I/O Interfaces Library
//!
//! This crate provides the sample sources and sinks the transceiver reads
//! from and writes to: cf32 files and a simulated loopback channel.

pub mod iq;
pub mod file;
pub mod loopback;

pub use iq::{bytes_to_samples, samples_to_bytes, IqBuffer, SampleSink, SampleSource};
pub use file::{read_cf32_file, write_cf32_file, IqFileSink, IqFileSource};
pub use loopback::{ChannelImpairments, LoopbackChannel};

use thiserror::Error;

/// Interface errors
#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sample data: {0}")]
    InvalidSampleData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
