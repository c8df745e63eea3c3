//! Stride Common - Shared types for the local-first progress engine
//!
//! Data model (identities, profiles, achievement events, sync status),
//! level derivation, the local durable cache, configuration and errors.

pub mod cache;
pub mod config;
pub mod error;
pub mod levels;
pub mod paths;
pub mod profile;
pub mod sqlite_cache;
pub mod types;

pub use cache::{CacheExt, LocalCache, MemoryCache};
pub use config::{CacheConfig, ProgressConfig, RemoteConfig, StrideConfig, SyncConfig};
pub use error::{Result, StrideError, SyncIssue};
pub use levels::{level_for_xp, DEFAULT_LEVEL_XP_UNIT};
pub use profile::ActorProfile;
pub use sqlite_cache::SqliteCache;
pub use types::*;
