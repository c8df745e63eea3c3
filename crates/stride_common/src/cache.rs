//! Local durable cache contract
//!
//! A synchronous key -> bytes store. Reads and writes never fail from the
//! caller's point of view: implementations log their own errors and degrade
//! to memory-only storage instead of propagating them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Guest id fallback for unauthenticated actors
pub const GUEST_ID_KEY: &str = "stride.guest_id";
/// Last-known actor profile snapshot
pub const PROFILE_KEY: &str = "stride.profile";
/// Event ids committed locally but not yet replicated
pub const PENDING_EVENTS_KEY: &str = "stride.ledger.pending";
/// Guest id already reconciled into a host identity
pub const UPGRADED_FROM_KEY: &str = "stride.upgraded_from";

/// Cache key for a named state slice
pub fn slice_key(key: &str) -> String {
    format!("slice.{}", key)
}

/// Marker present while a slice holds local writes the remote has not acknowledged
pub fn slice_dirty_key(key: &str) -> String {
    format!("slice-dirty.{}", key)
}

pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn set(&self, key: &str, value: &[u8]);

    fn remove(&self, key: &str);

    /// True once writes have fallen back to memory-only storage
    fn is_degraded(&self) -> bool {
        false
    }
}

/// JSON helpers over any cache
pub trait CacheExt {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T>;

    fn set_json<T: Serialize>(&self, key: &str, value: &T);
}

impl<C: LocalCache + ?Sized> CacheExt for C {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, "Ignoring unreadable cache entry: {}", e);
                None
            }
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, &bytes),
            Err(e) => warn!(key, "Failed to encode cache entry: {}", e),
        }
    }
}

/// In-process cache, used in tests and when no database can be opened
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) {
        self.entries().insert(key.to_string(), value.to_vec());
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }
}
