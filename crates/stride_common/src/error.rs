//! Error types for Stride.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrideError {
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, StrideError>;

/// Recoverable conditions the engine reports instead of failing.
///
/// None of these reach the presentation layer as an error; they are logged
/// and collected into resolution reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncIssue {
    /// Remote unreachable during bootstrap, running from the local cache
    IdentityResolutionFailure,
    /// Local commit succeeded but the remote push failed
    ReplicationFailure,
    /// An event was already recorded, its rewards were not applied again
    DuplicateEventSuppressed,
    /// Remote and local profiles disagreed and were merged
    RemoteDivergence,
}

impl SyncIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncIssue::IdentityResolutionFailure => "identity_resolution_failure",
            SyncIssue::ReplicationFailure => "replication_failure",
            SyncIssue::DuplicateEventSuppressed => "duplicate_event_suppressed",
            SyncIssue::RemoteDivergence => "remote_divergence",
        }
    }
}

impl fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
