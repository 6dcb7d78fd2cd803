//! Configuration loading.
//!
//! Configuration is read from TOML. Every field has a default, so an empty
//! document is a valid configuration:
//!
//! ```toml
//! [cache]
//! max_entries = 100000
//!
//! [history]
//! backend = "cache"      # or "database"
//! thread_safety = false
//!
//! [settings]
//! cache_minutes = 1440
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::settings::DEFAULT_SETTINGS_CACHE_MINUTES;
use crate::{Result, SmartCacheError};

/// Manager configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// In-process cache sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Maximum cached entries (default: 100,000).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

fn default_max_entries() -> u64 {
    100_000
}

/// Which history tracker records incoming and outgoing requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    /// Auto-expiring marker entries in the cache.
    #[default]
    Cache,
    /// Append-only request log in a store.
    Database,
}

/// History tracker selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub backend: HistoryBackend,
    /// Serialize store access with a real lock (default: false).
    #[serde(default)]
    pub thread_safety: bool,
}

/// Settings resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    /// How long resolved settings stay cached (default: 1440).
    #[serde(default = "default_settings_cache_minutes")]
    pub cache_minutes: u32,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            cache_minutes: default_settings_cache_minutes(),
        }
    }
}

fn default_settings_cache_minutes() -> u32 {
    DEFAULT_SETTINGS_CACHE_MINUTES
}

impl Config {
    /// Parse configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SmartCacheError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SmartCacheError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }
        let content = fs::read_to_string(path).map_err(|e| {
            SmartCacheError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            SmartCacheError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }
}
