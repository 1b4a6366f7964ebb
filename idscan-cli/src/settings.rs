//! Application settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use idscan_detect::{BaudLadder, CatalogConfig, ProbeConfig, DEFAULT_LADDER};
use idscan_engine::RegistryConfig;
use idscan_protocol::{DeviceClassifier, IdentCodec, DEFAULT_FAMILY, DEFAULT_KINDS};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Persisted scan settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Which ports the catalog hides
    pub catalog: CatalogConfig,
    /// Baud rates to try, in order
    pub baud_rates: Vec<u32>,
    /// Wait for a reply at each rate
    pub read_timeout_ms: u64,
    /// Bound on writing the query
    pub write_timeout_ms: u64,
    /// Pause after opening a port before querying it
    pub settle_delay_ms: u64,
    /// Response prefix a device must report
    pub family: String,
    /// Device kinds the classifier accepts, in display order
    pub kinds: Vec<String>,
    /// Slot pools
    pub registry: RegistryConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let probe = ProbeConfig::default();
        Self {
            catalog: CatalogConfig::default(),
            baud_rates: DEFAULT_LADDER.to_vec(),
            read_timeout_ms: millis(probe.read_timeout),
            write_timeout_ms: millis(probe.write_timeout),
            settle_delay_ms: millis(probe.settle_delay),
            family: DEFAULT_FAMILY.to_string(),
            kinds: DEFAULT_KINDS.iter().map(|k| k.to_string()).collect(),
            registry: RegistryConfig::default(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Settings {
    /// Get the XDG config directory for idscan
    /// Uses $XDG_CONFIG_HOME/idscan, falls back to ~/.config/idscan
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("idscan"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("idscan"))
    }

    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from `path`, or from the default location
    ///
    /// A missing or unreadable file gives the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Self::default();
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                debug!("No settings at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring malformed settings in {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save settings to `path`, or to the default location
    ///
    /// Returns the path written.
    pub fn save(&self, path: Option<&Path>) -> anyhow::Result<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::default_path)
            .context("Could not determine settings path")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = self.to_json()?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(path)
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize settings")
    }

    /// Prober configuration
    pub fn probe_config(&self) -> anyhow::Result<ProbeConfig> {
        let ladder = BaudLadder::new(self.baud_rates.clone()).context("Invalid baud_rates")?;
        Ok(ProbeConfig {
            ladder,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            family: self.family.clone(),
        })
    }

    /// Codec accepting the configured family
    pub fn codec(&self) -> IdentCodec {
        IdentCodec::with_families([self.family.clone()])
    }

    /// Classifier over the configured kinds
    pub fn classifier(&self) -> DeviceClassifier {
        DeviceClassifier::with_kinds(self.kinds.iter().map(String::as_str))
    }
}
