//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `threeway.toml` in the working directory. Every field has a
//! default so the file is optional. Environment variables take precedence
//! over file values.

use serde::Deserialize;

use threeway_adapter_virtual::config::VirtualConfig;
use threeway_app::config::SyncConfig;
use threeway_domain::id::SerialNumber;

const CONFIG_FILE: &str = "threeway.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discovery, refresh, grouping and race settings.
    pub sync: SyncConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Simulated devices served by the virtual transport.
    #[serde(rename = "virtual")]
    pub virtual_devices: VirtualConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "threewayd=info,threeway_app=info,threeway_adapter_virtual=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `threeway.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if a value
    /// is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(CONFIG_FILE)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = var("THREEWAY_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("THREEWAY_IGNORED_DEVICES") {
            self.sync.ignored_devices = val
                .split(',')
                .filter(|item| !item.trim().is_empty())
                .map(SerialNumber::new)
                .collect::<Result<_, _>>()
                .map_err(|err| ConfigError::Validation(err.to_string()))?;
        }
        if let Some(val) = var("THREEWAY_REPORT_ENABLED") {
            self.sync.report_enabled = parse_flag(&val);
        }
        if let Some(val) = var("THREEWAY_SWITCHES_ONLY") {
            self.sync.switches_only = parse_flag(&val);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let sync = &self.sync;
        let intervals = [
            ("discover_initial_interval_secs", sync.discover_initial_interval_secs),
            ("discover_interval_secs", sync.discover_interval_secs),
            ("refresh_interval_secs", sync.refresh_interval_secs),
            ("report_interval_secs", sync.report_interval_secs),
            ("race_timeout_secs", sync.race_timeout_secs),
            ("rpc_timeout_secs", sync.rpc_timeout_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Validation(format!("{name} must be non-zero")));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
