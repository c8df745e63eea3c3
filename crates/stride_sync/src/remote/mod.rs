//! Remote Store Adapter
//!
//! The remote store is authoritative when reachable but may be down at any
//! time. Production code talks HTTP through `HttpRemoteStore`; tests use
//! `MemoryRemoteStore`. Everything above this layer goes through
//! `RemoteClient`, which bounds each call with a timeout.

mod client;
mod http;
mod memory;

pub use client::RemoteClient;
pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;

use async_trait::async_trait;
use serde_json::Value;
use stride_common::profile::ProfileFields;
use stride_common::ActorProfile;

/// Remote store errors. All of them are treated as transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote store unreachable: {0}")]
    Unreachable(String),

    #[error("Remote call timed out after {0} ms")]
    Timeout(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote store returned HTTP {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_profile(&self, actor_id: &str) -> Result<Option<ActorProfile>, RemoteError>;

    async fn create_profile(&self, profile: &ActorProfile) -> Result<ActorProfile, RemoteError>;

    async fn update_profile(&self, actor_id: &str, fields: &ProfileFields)
        -> Result<(), RemoteError>;

    async fn fetch_slice(&self, actor_id: &str, key: &str) -> Result<Option<Value>, RemoteError>;

    async fn push_slice(&self, actor_id: &str, key: &str, payload: &Value)
        -> Result<(), RemoteError>;

    /// Insert an event record keyed by (actor, event).
    ///
    /// Returns true if the record already existed.
    async fn record_event(&self, actor_id: &str, event_id: &str) -> Result<bool, RemoteError>;
}
