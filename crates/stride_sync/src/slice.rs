//! Generic Slice Synchronizer
//!
//! Keeps one named state slice consistent between the local cache and the
//! remote store. The payload type is caller-defined and never inspected; it
//! only has to round-trip through JSON.
//!
//! Load sequence (non-blocking to `read`):
//! 1. hydrate from the local cache synchronously (or use the default),
//! 2. fetch the remote copy in the background,
//! 3. adopt it if it differs, unless a local write happened in the meantime.
//!
//! Writes update memory and the local cache immediately and schedule a
//! debounced push. Dropping the synchronizer cancels any pending push.
//!
//! A dirty marker is persisted with every write and cleared once the remote
//! acknowledges the latest value. A slice opened while dirty keeps its local
//! value and pushes it instead of adopting the remote copy.

use crate::context::SyncContext;
use crate::remote::RemoteError;
use crate::scheduler::{PushFn, PushFuture};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use stride_common::cache::{slice_dirty_key, slice_key, CacheExt};
use stride_common::{SyncIssue, SyncOutcome, SyncStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bounds every slice payload must satisfy
pub trait SlicePayload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> SlicePayload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

struct SliceInner<T> {
    key: String,
    cache_key: String,
    dirty_key: String,
    value: watch::Sender<T>,
    /// Count of local writes since construction
    local_writes: AtomicU64,
    /// Orders dirty marker updates against writes
    dirty_lock: Mutex<()>,
    ctx: SyncContext,
}

impl<T: SlicePayload> SliceInner<T> {
    fn current_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&*self.value.borrow())
    }

    fn dirty_lock(&self) -> MutexGuard<'_, ()> {
        self.dirty_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn commit(&self, value: T) {
        let _guard = self.dirty_lock();
        self.local_writes.fetch_add(1, Ordering::SeqCst);
        self.ctx.cache.set_json(&self.cache_key, &value);
        self.ctx.cache.set(&self.dirty_key, b"1");
        self.value.send_replace(value);
    }

    /// Clear the dirty marker unless a write landed after the pushed value
    fn mark_clean(&self, pushed_at: u64) {
        let _guard = self.dirty_lock();
        if self.local_writes.load(Ordering::SeqCst) == pushed_at {
            self.ctx.cache.remove(&self.dirty_key);
        }
    }
}

pub struct SliceSync<T: SlicePayload> {
    inner: Arc<SliceInner<T>>,
    hydrate: Option<JoinHandle<()>>,
}

impl<T: SlicePayload> SliceSync<T> {
    /// Open the slice `key`, hydrating synchronously from the local cache.
    ///
    /// Must be called inside a Tokio runtime; the remote refresh runs as a
    /// background task.
    pub fn open(ctx: SyncContext, key: &str, default: T) -> Self {
        let cache_key = slice_key(key);
        let dirty_key = slice_dirty_key(key);
        let cached: Option<T> = ctx.cache.get_json(&cache_key);
        let had_local = cached.is_some();
        let dirty = had_local && ctx.cache.get(&dirty_key).is_some();
        let (value, _) = watch::channel(cached.unwrap_or(default));

        let inner = Arc::new(SliceInner {
            key: key.to_string(),
            cache_key,
            dirty_key,
            value,
            local_writes: AtomicU64::new(0),
            dirty_lock: Mutex::new(()),
            ctx,
        });

        let mut slice = Self {
            inner,
            hydrate: None,
        };
        if dirty {
            info!(key, "Unpushed local writes from an earlier session, keeping local value");
            slice.schedule_push();
        } else {
            slice.hydrate = Some(tokio::spawn(hydrate_from_remote(
                slice.inner.clone(),
                had_local,
            )));
        }
        slice
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Current in-memory value
    pub fn read(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Replace the value, persist it locally and schedule a remote push
    pub fn write(&self, value: T) {
        self.inner.commit(value);
        self.schedule_push();
    }

    /// Derive the next value from the current one and write it
    pub fn update<F>(&self, updater: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        let next = updater(&self.read());
        self.write(next.clone());
        next
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.ctx.scheduler.status(&self.inner.key)
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.ctx.scheduler.subscribe(&self.inner.key)
    }

    /// Value changes, local or adopted from the remote store
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.inner.value.subscribe()
    }

    /// Push the current value now, bypassing the debounce window
    pub async fn force_sync(&self) -> SyncOutcome {
        self.inner
            .ctx
            .scheduler
            .flush(&self.inner.key, push_fn(self.inner.clone()))
            .await
    }

    fn schedule_push(&self) {
        self.inner.ctx.scheduler.schedule(
            &self.inner.key,
            self.inner.ctx.sync.debounce(),
            push_fn(self.inner.clone()),
        );
    }
}

impl<T: SlicePayload> Drop for SliceSync<T> {
    fn drop(&mut self) {
        if let Some(hydrate) = self.hydrate.take() {
            hydrate.abort();
        }
        self.inner.ctx.scheduler.cancel(&self.inner.key);
    }
}

fn push_fn<T: SlicePayload>(inner: Arc<SliceInner<T>>) -> PushFn {
    Arc::new(move || -> PushFuture {
        let inner = inner.clone();
        Box::pin(async move {
            let pushed_at = inner.local_writes.load(Ordering::SeqCst);
            let payload = inner
                .current_payload()
                .map_err(|e| RemoteError::Decode(e.to_string()))?;
            inner
                .ctx
                .remote
                .push_slice(&inner.ctx.actor_id, &inner.key, &payload)
                .await?;
            inner.mark_clean(pushed_at);
            Ok(())
        })
    })
}

async fn hydrate_from_remote<T: SlicePayload>(inner: Arc<SliceInner<T>>, had_local: bool) {
    let key = inner.key.as_str();

    let remote = match inner.ctx.remote.fetch_slice(&inner.ctx.actor_id, key).await {
        Ok(Some(remote)) => remote,
        Ok(None) => {
            debug!(key, "No remote copy of slice");
            if had_local {
                inner.ctx.scheduler.schedule(
                    key,
                    inner.ctx.sync.debounce(),
                    push_fn(inner.clone()),
                );
            }
            return;
        }
        Err(e) => {
            warn!(key, issue = %SyncIssue::ReplicationFailure, "Slice refresh failed, keeping local value: {}", e);
            return;
        }
    };

    let _guard = inner.dirty_lock();
    if inner.local_writes.load(Ordering::SeqCst) > 0 {
        debug!(key, "Local write since open, keeping local value");
        return;
    }

    if inner.current_payload().ok().as_ref() == Some(&remote) {
        return;
    }

    match serde_json::from_value::<T>(remote) {
        Ok(value) => {
            inner.ctx.cache.set_json(&inner.cache_key, &value);
            inner.value.send_replace(value);
            info!(key, "Adopted remote slice value");
        }
        Err(e) => warn!(key, "Remote slice payload does not match local shape: {}", e),
    }
}
