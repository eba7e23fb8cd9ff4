//! Configuration file support
//!
//! Loads configuration from ~/.config/tcpstats/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::platform::Platform;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeDefaults,

    #[serde(default)]
    pub output: OutputDefaults,

    #[serde(default)]
    pub logging: LoggingDefaults,
}

/// Default settings for the telemetry probe
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProbeDefaults {
    /// Diagnostics facility override (defaults to the build target's)
    pub platform: Option<Platform>,

    /// Seconds between readings
    pub interval_secs: Option<f64>,

    /// Number of readings before exiting (0 = until interrupted)
    pub count: Option<u64>,
}

/// Default output settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputDefaults {
    /// Print one JSON object per reading
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingDefaults {
    /// Log file path (e.g., "~/.config/tcpstats/tcpstats.log", null to disable)
    pub log_file: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration from the default path.
    /// Returns default config if file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tcpstats")
            .join("config.toml")
    }

    /// Configured platform, falling back to the native one
    pub fn platform(&self) -> Platform {
        self.probe.platform.unwrap_or_else(Platform::native)
    }
}
