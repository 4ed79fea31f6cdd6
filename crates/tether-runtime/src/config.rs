//! Runtime configuration.
//!
//! Loaded from YAML; every field has a default so an empty document is a
//! valid configuration. Durations are written human-style (`30s`, `250ms`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::providers::CompletionConfig;

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// (De)serialize a `Duration` as a humantime string.
pub(crate) mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// Provider connection settings.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// API key; the provider's environment variable is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Configuration for a verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Per-call oracle timeout
    #[serde(with = "humantime_duration")]
    pub oracle_timeout: Duration,

    /// Retries after the first attempt before fallback extraction
    pub max_retries: u32,

    /// First retry delay; grows exponentially
    #[serde(with = "humantime_duration")]
    pub retry_backoff: Duration,

    /// Oracle calls in flight at once
    pub max_concurrent_calls: usize,

    /// Claims in flight at once
    pub max_concurrent_claims: usize,

    /// Total token budget for one run
    pub token_budget: u32,

    pub completion: CompletionConfig,

    pub provider: ProviderSettings,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
            max_concurrent_calls: 8,
            max_concurrent_claims: 4,
            token_budget: 200_000,
            completion: CompletionConfig::default(),
            provider: ProviderSettings::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a YAML configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oracle_timeout.is_zero() {
            return Err(ConfigError::Invalid("oracle_timeout must be positive".to_string()));
        }
        if self.max_concurrent_calls == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_calls must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_claims == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_claims must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
