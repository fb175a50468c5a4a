//! TOML run configuration.
//!
//! Every field has a default, so an absent or empty file yields the standard
//! layout: symbols from `data/metadata/datasimpleStockdata.json`, output to
//! `data/companyData/`, five seconds between symbols.

use crate::tracker::CompletionPolicy;
use companyfetch_core::data::{HistoryRange, YahooOptions, DEFAULT_METADATA_MODULES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "companyfetch.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration for a fetch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Base directory the two paths below are resolved against.
    pub data_root: PathBuf,
    pub symbols_file: PathBuf,
    pub output_dir: PathBuf,
    /// Minimum seconds between the starts of two fetched symbols. 0 disables pacing.
    pub pacing_secs: u64,
    pub completion: CompletionPolicy,
    pub provider: ProviderConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            symbols_file: PathBuf::from("data/metadata/datasimpleStockdata.json"),
            output_dir: PathBuf::from("data/companyData"),
            pacing_secs: 5,
            completion: CompletionPolicy::default(),
            provider: ProviderConfig::default(),
        }
    }
}

/// Provider request settings (`[provider]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub history_range: HistoryRange,
    pub auto_adjust: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub metadata_modules: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            history_range: HistoryRange::Max,
            auto_adjust: true,
            timeout_secs: 30,
            max_retries: 3,
            metadata_modules: DEFAULT_METADATA_MODULES
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl ProviderConfig {
    pub fn yahoo_options(&self) -> YahooOptions {
        YahooOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            auto_adjust: self.auto_adjust,
            metadata_modules: self.metadata_modules.clone(),
            ..YahooOptions::default()
        }
    }
}

impl FetchConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("symbols_file must not be empty".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_dir must not be empty".into()));
        }
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "provider.timeout_secs must be at least 1".into(),
            ));
        }
        if self.provider.metadata_modules.is_empty() {
            return Err(ConfigError::Invalid(
                "provider.metadata_modules must list at least one module".into(),
            ));
        }
        Ok(())
    }

    pub fn symbols_path(&self) -> PathBuf {
        self.data_root.join(&self.symbols_file)
    }

    pub fn output_root(&self) -> PathBuf {
        self.data_root.join(&self.output_dir)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }
}
