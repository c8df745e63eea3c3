//! In-memory remote store
//!
//! Behaves like the authoritative backend and can be switched offline or made
//! to hang, so callers can exercise degraded and timeout paths without a
//! network. Call counters and the slice push log make assertions easy.

use super::{RemoteError, RemoteStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use stride_common::profile::ProfileFields;
use stride_common::ActorProfile;

#[derive(Default)]
struct RemoteState {
    profiles: HashMap<String, ActorProfile>,
    slices: HashMap<(String, String), Value>,
    events: HashSet<(String, String)>,
    /// Every accepted slice push, in arrival order
    pushes: Vec<(String, String, Value)>,
    calls: HashMap<&'static str, usize>,
}

#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<RemoteState>,
    offline: AtomicBool,
    hanging: AtomicBool,
    push_delay: Mutex<Option<Duration>>,
    pushes_in_flight: AtomicUsize,
    max_pushes_in_flight: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every call fails with `Unreachable` while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every call never resolves while hanging
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    /// Make each slice push take this long
    pub fn set_push_delay(&self, delay: Option<Duration>) {
        *self.push_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state().calls.get(op).copied().unwrap_or(0)
    }

    pub fn profile(&self, actor_id: &str) -> Option<ActorProfile> {
        self.state().profiles.get(actor_id).cloned()
    }

    pub fn insert_profile(&self, profile: ActorProfile) {
        self.state()
            .profiles
            .insert(profile.identity.id.clone(), profile);
    }

    pub fn slice(&self, actor_id: &str, key: &str) -> Option<Value> {
        self.state()
            .slices
            .get(&(actor_id.to_string(), key.to_string()))
            .cloned()
    }

    pub fn insert_slice(&self, actor_id: &str, key: &str, payload: Value) {
        self.state()
            .slices
            .insert((actor_id.to_string(), key.to_string()), payload);
    }

    pub fn has_event(&self, actor_id: &str, event_id: &str) -> bool {
        self.state()
            .events
            .contains(&(actor_id.to_string(), event_id.to_string()))
    }

    pub fn insert_event(&self, actor_id: &str, event_id: &str) {
        self.state()
            .events
            .insert((actor_id.to_string(), event_id.to_string()));
    }

    /// Payloads pushed for one slice key, oldest first
    pub fn pushes(&self, key: &str) -> Vec<Value> {
        self.state()
            .pushes
            .iter()
            .filter(|(_, k, _)| k == key)
            .map(|(_, _, payload)| payload.clone())
            .collect()
    }

    /// Highest number of concurrent slice pushes observed
    pub fn max_pushes_in_flight(&self) -> usize {
        self.max_pushes_in_flight.load(Ordering::SeqCst)
    }

    async fn gate(&self, op: &'static str) -> Result<(), RemoteError> {
        *self.state().calls.entry(op).or_insert(0) += 1;

        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("remote store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_profile(&self, actor_id: &str) -> Result<Option<ActorProfile>, RemoteError> {
        self.gate("fetch_profile").await?;
        Ok(self.profile(actor_id))
    }

    async fn create_profile(&self, profile: &ActorProfile) -> Result<ActorProfile, RemoteError> {
        self.gate("create_profile").await?;
        let mut state = self.state();
        let stored = state
            .profiles
            .entry(profile.identity.id.clone())
            .or_insert_with(|| profile.clone());
        Ok(stored.clone())
    }

    async fn update_profile(
        &self,
        actor_id: &str,
        fields: &ProfileFields,
    ) -> Result<(), RemoteError> {
        self.gate("update_profile").await?;
        let mut state = self.state();
        match state.profiles.get_mut(actor_id) {
            Some(profile) => {
                profile.apply_fields(fields);
                Ok(())
            }
            None => Err(RemoteError::NotFound(format!("profile {}", actor_id))),
        }
    }

    async fn fetch_slice(&self, actor_id: &str, key: &str) -> Result<Option<Value>, RemoteError> {
        self.gate("fetch_slice").await?;
        Ok(self.slice(actor_id, key))
    }

    async fn push_slice(
        &self,
        actor_id: &str,
        key: &str,
        payload: &Value,
    ) -> Result<(), RemoteError> {
        self.gate("push_slice").await?;

        let in_flight = self.pushes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_pushes_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let delay = *self.push_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut state = self.state();
            state
                .slices
                .insert((actor_id.to_string(), key.to_string()), payload.clone());
            state
                .pushes
                .push((actor_id.to_string(), key.to_string(), payload.clone()));
        }

        self.pushes_in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn record_event(&self, actor_id: &str, event_id: &str) -> Result<bool, RemoteError> {
        self.gate("record_event").await?;
        let inserted = self
            .state()
            .events
            .insert((actor_id.to_string(), event_id.to_string()));
        Ok(!inserted)
    }
}
