//! Configuration for the diagnostics pipeline.
//!
//! Configuration is loaded with figment, supporting TOML config files,
//! environment variables, and defaults. Every knob has a working default,
//! so embedding applications can also construct [`Config`] directly.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ring;
use crate::tracker;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "flashdiag";

/// Environment variable prefix.
const ENV_PREFIX: &str = "FLASHDIAG_";

/// Pipeline configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FLASHDIAG_`)
/// 2. TOML config file at `~/.config/flashdiag/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial capture configuration.
    pub serial: SerialConfig,
    /// Error tracking configuration.
    pub errors: ErrorLogConfig,
    /// Redaction configuration.
    pub redaction: RedactionConfig,
    /// Bundle assembly configuration.
    pub bundle: BundleConfig,
}

/// Serial capture configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Maximum number of serial lines retained.
    pub capacity: usize,
    /// Whether capture starts enabled.
    pub capture_enabled: bool,
}

/// Error tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorLogConfig {
    /// Maximum number of buffered error entries.
    pub max_entries: usize,
    /// Dedupe window for identical errors, in milliseconds.
    pub dedupe_window_ms: u64,
}

/// Redaction configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Leave IP addresses in place by default.
    pub allow_ips: bool,
}

/// Bundle assembly configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Product name used in the summary line.
    pub product_name: String,
    /// File name prefix for generated bundles.
    pub file_prefix: String,
    /// Whether bundles include the captured serial log by default.
    pub include_serial: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            capacity: ring::DEFAULT_CAPACITY,
            capture_enabled: false,
        }
    }
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        Self {
            max_entries: tracker::DEFAULT_MAX_ENTRIES,
            dedupe_window_ms: tracker::DEFAULT_DEDUPE_WINDOW_MS,
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            product_name: "WebFlash".to_string(),
            file_prefix: "webflash_support".to_string(),
            include_serial: true,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation
    /// fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation
    /// fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.serial.capacity == 0 {
            return Err(Error::config_validation(
                "serial.capacity must be greater than 0",
            ));
        }

        if self.errors.max_entries == 0 {
            return Err(Error::config_validation(
                "errors.max_entries must be greater than 0",
            ));
        }

        if self.bundle.file_prefix.is_empty() {
            return Err(Error::config_validation(
                "bundle.file_prefix must not be empty",
            ));
        }

        Ok(())
    }

    /// Get the dedupe window as a Duration.
    #[must_use]
    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.errors.dedupe_window_ms)
    }
}
