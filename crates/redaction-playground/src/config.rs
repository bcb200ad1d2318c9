//! Configuration management for the redaction playground.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::detector::{DetectorOptions, Preset, RedactionMode};
use crate::error::{Error, Result};
use crate::loader::DetectorSource;
use crate::merge::OverlapPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const DATA_DIR_NAME: &str = "redaction-playground";

/// Prefix of environment variable overrides.
const ENV_PREFIX: &str = "REDPLAY_";

/// Default assist backend.
pub const DEFAULT_ASSIST_URL: &str = "https://openredaction-api.onrender.com";

/// Default input cap, in UTF-16 units.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 500;

/// Shortest excerpt column that can still show an ellipsis.
const MIN_EXCERPT_CHARS: usize = 4;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `REDPLAY_`, sections split by `__`)
/// 2. TOML config file at `~/.config/redaction-playground/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local detection configuration.
    pub detector: DetectorConfig,
    /// Remote assist configuration.
    pub assist: AssistConfig,
    /// Input and output limits.
    pub limits: LimitsConfig,
}

/// Local detection configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Where the pattern pack is loaded from: `builtin`, a URL, or a path.
    pub source: DetectorSource,
    /// Category preset.
    pub preset: Preset,
    /// How matches are replaced.
    pub mode: RedactionMode,
    /// How overlapping local and remote spans are merged.
    pub overlap_policy: OverlapPolicy,
}

/// Remote assist configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    /// Run remote assist by default.
    pub enabled: bool,
    /// Base URL of the assist backend.
    pub base_url: String,
    /// API key sent with assist requests.
    pub api_key: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Longest input sent for assist, in UTF-16 units.
    pub max_input_chars: usize,
}

/// Input and output limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Longest input accepted, in UTF-16 units.
    pub max_input_chars: usize,
    /// Width of the value excerpt in table output.
    pub table_excerpt_chars: usize,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: DEFAULT_ASSIST_URL.to_string(),
            api_key: None,
            timeout_ms: 15_000,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            table_excerpt_chars: 24,
        }
    }
}

impl DetectorConfig {
    /// Detector options for the configured preset and mode.
    #[must_use]
    pub fn detector_options(&self) -> DetectorOptions {
        DetectorOptions::from_preset(self.preset).with_mode(self.mode)
    }
}

impl AssistConfig {
    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured API key, if non-empty.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `REDPLAY_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The layered provider for `config_file`.
    #[must_use]
    pub fn figment(config_file: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_input_chars == 0 {
            return Err(Error::config_validation(
                "limits.max_input_chars must be greater than 0",
            ));
        }

        if self.assist.max_input_chars > self.limits.max_input_chars {
            return Err(Error::config_validation(format!(
                "assist.max_input_chars ({}) cannot be greater than limits.max_input_chars ({})",
                self.assist.max_input_chars, self.limits.max_input_chars
            )));
        }

        if self.assist.timeout_ms == 0 {
            return Err(Error::config_validation(
                "assist.timeout_ms must be greater than 0",
            ));
        }

        let url = self.assist.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::config_validation(format!(
                "assist.base_url must be an http(s) URL: {url}"
            )));
        }

        if self.limits.table_excerpt_chars < MIN_EXCERPT_CHARS {
            return Err(Error::config_validation(format!(
                "limits.table_excerpt_chars must be at least {MIN_EXCERPT_CHARS}"
            )));
        }

        Ok(())
    }
}
