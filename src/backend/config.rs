//! Runtime configuration
//!
//! The only tunable today is the trampoline bounce limit: how many nested bounces run
//! directly on the native stack before work is deferred to the driver loop. It can be
//! read from a TOML file and overridden through the environment:
//!
//! ```toml
//! [runtime]
//! bounce_limit = 128
//! ```
//!
//! `METATAG_BOUNCE_LIMIT=64` overrides whatever the file says.

use std::fmt;

use serde::Deserialize;

use super::trampoline::DEFAULT_BOUNCE_LIMIT;

/// Environment variable overriding [`RuntimeConfig::bounce_limit`]
pub const BOUNCE_LIMIT_ENV: &str = "METATAG_BOUNCE_LIMIT";

/// Settings for one [`crate::backend::Runtime`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Nested bounces allowed before deferring; must be at least 1
    pub bounce_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            bounce_limit: DEFAULT_BOUNCE_LIMIT,
        }
    }
}

/// Layout of a configuration file; everything lives under `[runtime]`
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    runtime: RuntimeConfig,
}

impl RuntimeConfig {
    pub fn with_bounce_limit(bounce_limit: usize) -> Result<Self, ConfigError> {
        RuntimeConfig { bounce_limit }.validate()
    }

    /// Parse a TOML configuration document.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(ConfigError::Toml)?;
        file.runtime.validate()
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        RuntimeConfig::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let raw = std::env::var(BOUNCE_LIMIT_ENV).ok();
        self.apply_bounce_override(raw.as_deref())
    }

    fn apply_bounce_override(mut self, raw: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(raw) = raw {
            self.bounce_limit = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: BOUNCE_LIMIT_ENV,
                value: raw.to_string(),
            })?;
        }
        self.validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.bounce_limit == 0 {
            return Err(ConfigError::InvalidBounceLimit(self.bounce_limit));
        }
        Ok(self)
    }
}

/// Errors while loading a [`RuntimeConfig`]
#[derive(Debug)]
pub enum ConfigError {
    Toml(toml::de::Error),
    InvalidBounceLimit(usize),
    InvalidEnv { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Toml(e) => write!(f, "invalid runtime config: {}", e),
            ConfigError::InvalidBounceLimit(limit) => {
                write!(f, "bounce_limit must be at least 1, got {}", limit)
            }
            ConfigError::InvalidEnv { var, value } => {
                write!(f, "{} must be a positive integer, got {:?}", var, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
