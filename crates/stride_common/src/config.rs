//! Configuration management for Stride.
//!
//! Loads settings from $STRIDE_CONFIG or the XDG config dir, or uses defaults.

use crate::error::{Result, StrideError};
use crate::levels::DEFAULT_LEVEL_XP_UNIT;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Remote store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote profile/slice API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound for every remote call, in milliseconds
    #[serde(default = "default_remote_timeout")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_remote_timeout() -> u64 {
    5_000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_remote_timeout(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Debounce and status display timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiet period after the last slice write before pushing
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// How long SYNCED/ERROR stays visible before reverting to IDLE
    #[serde(default = "default_status_display")]
    pub status_display_ms: u64,

    /// Debounce for ledger replication (0 = next tick)
    #[serde(default)]
    pub ledger_debounce_ms: u64,
}

fn default_debounce() -> u64 {
    1_000
}

fn default_status_display() -> u64 {
    2_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            status_display_ms: default_status_display(),
            ledger_debounce_ms: 0,
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn status_display(&self) -> Duration {
        Duration::from_millis(self.status_display_ms)
    }

    pub fn ledger_debounce(&self) -> Duration {
        Duration::from_millis(self.ledger_debounce_ms)
    }
}

/// Reward economy constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_level_xp_unit")]
    pub level_xp_unit: u64,

    /// Coins granted to a newly created profile
    #[serde(default = "default_starting_coins")]
    pub starting_coins: u64,
}

fn default_level_xp_unit() -> u64 {
    DEFAULT_LEVEL_XP_UNIT
}

fn default_starting_coins() -> u64 {
    100
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            level_xp_unit: default_level_xp_unit(),
            starting_coins: default_starting_coins(),
        }
    }
}

/// Local cache location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite database path (defaults to the XDG data dir)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    pub fn db_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(paths::cache_db)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrideConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl StrideConfig {
    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&paths::config_file())
    }

    /// Load from a specific file; missing or malformed files yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path)
            .map_err(StrideError::from)
            .and_then(|content| Self::parse(&content))
        {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), "Failed to load config: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
