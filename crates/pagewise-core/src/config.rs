//! Runtime configuration: cache lifetime and page size.
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables.

use crate::{DEFAULT_CACHE_TTL_SECS, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, time::Duration};
use thiserror::Error as ThisError;

pub const ENV_CACHE_TTL_SECS: &str = "PAGEWISE_CACHE_TTL_SECS";
pub const ENV_PAGE_SIZE: &str = "PAGEWISE_PAGE_SIZE";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{key} must be a non-negative integer, got '{value}'")]
    InvalidOverride { key: &'static str, value: String },

    #[error("page_size must be between 1 and {max}, got {0}", max = MAX_PAGE_SIZE)]
    PageSizeOutOfRange(u32),
}

///
/// AccessConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    /// Lifetime of the baseline cache in seconds; `0` disables caching.
    pub cache_ttl_secs: u64,

    /// Records requested per store page.
    pub page_size: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AccessConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&raw)
    }

    /// Defaults (or `path`, when given) overridden by the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        base.with_overrides(&std::env::vars().collect())
    }

    /// Apply `PAGEWISE_*` overrides from an explicit key/value map.
    pub fn with_overrides(mut self, vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        if let Some(secs) = parse_override::<u64>(vars, ENV_CACHE_TTL_SECS)? {
            self.cache_ttl_secs = secs;
        }
        if let Some(size) = parse_override::<u32>(vars, ENV_PAGE_SIZE)? {
            self.page_size = size;
        }
        self.validate()?;

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::PageSizeOutOfRange(self.page_size));
        }

        Ok(())
    }

    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn parse_override<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidOverride {
            key,
            value: raw.to_string(),
        })
}

///
/// TESTS
///
