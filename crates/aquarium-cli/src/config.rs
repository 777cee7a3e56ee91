//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use aquarium_core::uuid::DEVICE_NAME;
use aquarium_core::{BleOptions, ClientOptions, DEFAULT_QUIET_MINUTES, ProtocolRevision};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cli::LinkArgs;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Advertised controller name
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Protocol revision: "multi" or "single"
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Scan timeout in seconds
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout: u64,

    /// Connect timeout in seconds
    #[serde(default)]
    pub connect_timeout: Option<u64>,

    /// Quiet-mode duration sent by `set quiet on`
    #[serde(default = "default_quiet_minutes")]
    pub quiet_minutes: u16,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,
}

fn default_device_name() -> String {
    DEVICE_NAME.to_string()
}

fn default_revision() -> String {
    ProtocolRevision::default().as_str().to_string()
}

fn default_scan_timeout() -> u64 {
    5
}

fn default_quiet_minutes() -> u16 {
    DEFAULT_QUIET_MINUTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            revision: default_revision(),
            scan_timeout: default_scan_timeout(),
            connect_timeout: Some(30),
            quiet_minutes: default_quiet_minutes(),
            no_color: false,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aquarium")
            .join("config.toml")
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`. Unreadable or invalid files yield the
    /// defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => warn!("Failed to parse config {}: {}", path.display(), e),
                },
                Err(e) => warn!("Failed to read config {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Client options with flags and environment taking precedence.
    pub fn client_options(&self, link: &LinkArgs) -> Result<ClientOptions> {
        let revision = match link.revision {
            Some(revision) => revision,
            None => self
                .revision
                .parse()
                .with_context(|| format!("Invalid revision in config: '{}'", self.revision))?,
        };
        let device_name = link
            .device
            .clone()
            .unwrap_or_else(|| self.device_name.clone());

        Ok(ClientOptions::new()
            .revision(revision)
            .device_name(device_name)
            .quiet_minutes(self.quiet_minutes))
    }

    /// Transport options with the `--timeout` flag taking precedence.
    pub fn ble_options(&self, link: &LinkArgs) -> BleOptions {
        let scan = link.timeout.unwrap_or(self.scan_timeout);
        let options = BleOptions::new().scan_duration(Duration::from_secs(scan));
        match self.connect_timeout {
            Some(secs) => options.connect_timeout(Duration::from_secs(secs)),
            None => options,
        }
    }
}
