//! Transceiver configuration files
//!
//! A single file (YAML or TOML, chosen by extension) carries the PHY
//! configuration, the constellation and the simulated channel used by the
//! loopback mode. Every section is optional.

use anyhow::{bail, Context};
use interfaces::ChannelImpairments;
use phy::{Modulation, OfdmConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrxConfig {
    /// OFDM engine configuration
    #[serde(default)]
    pub ofdm: OfdmConfig,
    /// Payload constellation
    #[serde(default = "default_modulation")]
    pub modulation: Modulation,
    /// Channel used by the loopback mode
    #[serde(default)]
    pub channel: ChannelImpairments,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

fn default_modulation() -> Modulation {
    Modulation::Qpsk
}

impl Default for TrxConfig {
    fn default() -> Self {
        Self {
            ofdm: OfdmConfig::default(),
            modulation: default_modulation(),
            channel: ChannelImpairments::default(),
            log: LogConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TrxConfig {
    /// Load configuration from a `.yaml`/`.yml` or `.toml` file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let config = match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            _ => bail!("Unsupported configuration format: {}", path.display()),
        }
        .with_context(|| format!("Invalid configuration {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reject values the PHY or the channel would refuse later
    pub fn validate(&self) -> anyhow::Result<()> {
        self.ofdm.validate()?;
        let grid = self.ofdm.grid()?;
        self.channel.validate()?;

        // equalized symbols are scaled so the pilots land on the radius
        let eq = &self.ofdm.equalizer;
        let scale = eq.constellation_radius / grid.pilot_value().norm();
        let low = self.modulation.min_magnitude() * scale;
        let high = self.modulation.peak_magnitude() * scale;
        if low <= eq.min_magnitude || high >= eq.max_magnitude {
            bail!(
                "{:?} symbols span {:.3}..{:.3} after equalization, outside the accepted band {}..{}",
                self.modulation,
                low,
                high,
                eq.min_magnitude,
                eq.max_magnitude
            );
        }
        Ok(())
    }
}
