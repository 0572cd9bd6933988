//! Configuration file support for epromctl.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (EPROMCTL_*)
//! 3. Local config file (./epromctl.toml)
//! 4. Global config file (~/.config/epromctl/config.toml)
//!
//! An explicit `--config PATH` replaces both files.

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-directory config file.
pub const LOCAL_CONFIG_FILE: &str = "epromctl.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Serial port (e.g., "/dev/ttyUSB0" or "COM4").
    pub port: Option<String>,
    /// Wait after opening the port before the programmer talks.
    pub settle_ms: Option<u64>,
    /// Window for one response line.
    pub timeout_ms: Option<u64>,
}

/// Device configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Default EPROM type.
    pub name: Option<String>,
}

/// Progress display configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Addresses per mark.
    pub stride: Option<usize>,
    /// Marks per line.
    pub marks_per_line: Option<usize>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Device settings.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Progress settings.
    #[serde(default)]
    pub progress: ProgressConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "epromctl").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Settle delay, if configured.
    pub fn settle_delay(&self) -> Option<Duration> {
        self.connection.settle_ms.map(Duration::from_millis)
    }

    /// Response window, if configured.
    pub fn response_timeout(&self) -> Option<Duration> {
        self.connection.timeout_ms.map(Duration::from_millis)
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.settle_ms.is_some() {
            self.connection.settle_ms = other.connection.settle_ms;
        }
        if other.connection.timeout_ms.is_some() {
            self.connection.timeout_ms = other.connection.timeout_ms;
        }

        if other.device.name.is_some() {
            self.device.name = other.device.name;
        }

        if other.progress.stride.is_some() {
            self.progress.stride = other.progress.stride;
        }
        if other.progress.marks_per_line.is_some() {
            self.progress.marks_per_line = other.progress.marks_per_line;
        }
    }
}
