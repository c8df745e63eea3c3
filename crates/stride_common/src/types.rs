//! Core data contracts shared by the resolver, ledger and slice synchronizers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// Supplied by the host platform identity provider
    HostPlatform,
    /// Generated locally and persisted in the cache
    LocalGuest,
}

/// Stable identifier for the current user of a session.
///
/// Never mutated after creation. A guest identity may be replaced by a host
/// identity in a later session, which triggers a one-time reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    pub id: String,
    pub source_kind: SourceKind,
    pub display_name: String,
    pub avatar_ref: Option<String>,
}

impl ActorIdentity {
    pub fn host(hint: &HostIdentity) -> Self {
        Self {
            id: hint.id.to_string(),
            source_kind: SourceKind::HostPlatform,
            display_name: hint.display_name.clone(),
            avatar_ref: hint.avatar_ref.clone(),
        }
    }

    pub fn guest(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_kind: SourceKind::LocalGuest,
            display_name: "Guest".to_string(),
            avatar_ref: None,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.source_kind == SourceKind::LocalGuest
    }
}

/// Host platform user id, which may arrive numeric or textual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostId {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostId::Numeric(n) => write!(f, "{}", n),
            HostId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for HostId {
    fn from(id: u64) -> Self {
        HostId::Numeric(id)
    }
}

impl From<&str> for HostId {
    fn from(id: &str) -> Self {
        HostId::Text(id.to_string())
    }
}

/// Identity hint from the host platform, available synchronously at session start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIdentity {
    pub id: HostId,
    pub display_name: String,
    pub avatar_ref: Option<String>,
}

impl HostIdentity {
    pub fn new(id: impl Into<HostId>, display_name: &str) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.to_string(),
            avatar_ref: None,
        }
    }

    pub fn with_avatar(mut self, avatar_ref: &str) -> Self {
        self.avatar_ref = Some(avatar_ref.to_string());
        self
    }
}

/// An externally defined, idempotency-keyed unit of reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementEvent {
    pub event_id: String,
    pub xp_reward: u64,
    pub coins_reward: u64,
}

impl AchievementEvent {
    pub fn new(event_id: &str, xp_reward: u64, coins_reward: u64) -> Self {
        Self {
            event_id: event_id.to_string(),
            xp_reward,
            coins_reward,
        }
    }
}

/// Per-channel replication status shown by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Synced,
    Error,
}

impl SyncStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }

    /// Settled states revert to Idle after the display window
    pub fn is_settled(&self) -> bool {
        matches!(self, SyncStatus::Synced | SyncStatus::Error)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of an explicit force-sync call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Success,
    Failure,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success)
    }
}
