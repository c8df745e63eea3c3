//! Path helpers for Stride
//!
//! Follows the XDG base directory layout via `dirs`, with a /tmp fallback
//! when no home directory can be determined.

use std::path::PathBuf;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "STRIDE_CONFIG";

/// Get the default config file path
///
/// Priority:
/// 1. $STRIDE_CONFIG
/// 2. $XDG_CONFIG_HOME/stride/config.toml
/// 3. /tmp/stride/config.toml
pub fn config_file() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("stride/config.toml")
}

/// Get the default local cache database path
pub fn cache_db() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("stride/cache.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_db_file_name() {
        let path = cache_db();
        assert!(path.ends_with("stride/cache.db"));
    }

    #[test]
    fn test_config_file_file_name() {
        let path = config_file();
        assert!(path.to_string_lossy().ends_with(".toml"));
    }
}
