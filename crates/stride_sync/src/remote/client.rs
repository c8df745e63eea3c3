//! Timeout-bounded access to a remote store

use super::{RemoteError, RemoteStore};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stride_common::profile::ProfileFields;
use stride_common::ActorProfile;
use tracing::debug;

/// Every call through this client either completes or fails with
/// `RemoteError::Timeout` once the configured bound elapses.
#[derive(Clone)]
pub struct RemoteClient {
    store: Arc<dyn RemoteStore>,
    timeout: Duration,
}

impl RemoteClient {
    pub fn new(store: Arc<dyn RemoteStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                debug!(op, timeout_ms = self.timeout.as_millis() as u64, "Remote call timed out");
                Err(RemoteError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    pub async fn fetch_profile(&self, actor_id: &str) -> Result<Option<ActorProfile>, RemoteError> {
        self.bounded("fetch_profile", self.store.fetch_profile(actor_id))
            .await
    }

    pub async fn create_profile(&self, profile: &ActorProfile) -> Result<ActorProfile, RemoteError> {
        self.bounded("create_profile", self.store.create_profile(profile))
            .await
    }

    pub async fn update_profile(
        &self,
        actor_id: &str,
        fields: &ProfileFields,
    ) -> Result<(), RemoteError> {
        self.bounded("update_profile", self.store.update_profile(actor_id, fields))
            .await
    }

    pub async fn fetch_slice(&self, actor_id: &str, key: &str) -> Result<Option<Value>, RemoteError> {
        self.bounded("fetch_slice", self.store.fetch_slice(actor_id, key))
            .await
    }

    pub async fn push_slice(
        &self,
        actor_id: &str,
        key: &str,
        payload: &Value,
    ) -> Result<(), RemoteError> {
        self.bounded("push_slice", self.store.push_slice(actor_id, key, payload))
            .await
    }

    pub async fn record_event(&self, actor_id: &str, event_id: &str) -> Result<bool, RemoteError> {
        self.bounded("record_event", self.store.record_event(actor_id, event_id))
            .await
    }
}
