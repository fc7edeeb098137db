//! cf32 file source and sink

use crate::iq::{bytes_to_samples, samples_to_bytes, IqBuffer, SampleSink, SampleSource};
use crate::InterfaceError;
use common::types::Sample;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read a whole cf32 file
pub fn read_cf32_file(path: impl AsRef<Path>) -> Result<Vec<Sample>, InterfaceError> {
    let bytes = std::fs::read(path.as_ref())?;
    let samples = bytes_to_samples(&bytes)?;
    info!("Read {} samples from {}", samples.len(), path.as_ref().display());
    Ok(samples)
}

/// Write samples to a cf32 file, replacing it
pub fn write_cf32_file(path: impl AsRef<Path>, samples: &[Sample]) -> Result<(), InterfaceError> {
    std::fs::write(path.as_ref(), samples_to_bytes(samples))?;
    info!("Wrote {} samples to {}", samples.len(), path.as_ref().display());
    Ok(())
}

/// Sink appending every transmitted buffer to a cf32 file
pub struct IqFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl IqFileSink {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self, InterfaceError> {
        let path = path.as_ref().to_path_buf();
        let writer = BufWriter::new(File::create(&path)?);
        debug!("Opened cf32 sink {}", path.display());
        Ok(Self {
            path,
            writer,
            written: 0,
        })
    }

    /// Samples written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered samples to disk
    pub fn flush(&mut self) -> Result<(), InterfaceError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl SampleSink for IqFileSink {
    fn transmit(&mut self, samples: &[Sample]) -> Result<(), InterfaceError> {
        self.writer.write_all(&samples_to_bytes(samples))?;
        self.written += samples.len() as u64;
        Ok(())
    }
}

impl Drop for IqFileSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Source reading a cf32 file in chunks
pub struct IqFileSource {
    samples: Vec<Sample>,
    position: usize,
}

impl IqFileSource {
    /// Load the file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, InterfaceError> {
        Ok(Self {
            samples: read_cf32_file(path)?,
            position: 0,
        })
    }

    /// Samples not yet received
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl SampleSource for IqFileSource {
    fn receive(&mut self, count: usize) -> Result<IqBuffer, InterfaceError> {
        let end = (self.position + count).min(self.samples.len());
        let buffer = IqBuffer::from_samples(
            self.samples[self.position..end].to_vec(),
            self.position as u64,
            0,
        );
        self.position = end;
        Ok(buffer)
    }
}
