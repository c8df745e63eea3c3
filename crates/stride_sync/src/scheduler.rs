//! Sync scheduler - per-key debounced, serialized remote pushes
//!
//! Each key owns a channel with:
//! - at most one pending debounce timer (a new schedule cancels the old one),
//! - a push lock so pushes for the key never overlap,
//! - at most one queued follow-up push while a push is in flight,
//! - a status value observable through a `watch` receiver.
//!
//! A fired timer hands the push to its own task. Windows that elapse while a
//! push is in flight collapse into a single follow-up push, started once the
//! in-flight one settles. Cancelling aborts the pending timer and drops the
//! queued follow-up; an in-flight push always completes.
//!
//! All methods that start timers must be called inside a Tokio runtime.

use crate::remote::RemoteError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use stride_common::{SyncIssue, SyncOutcome, SyncStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub type PushFuture = Pin<Box<dyn Future<Output = Result<(), RemoteError>> + Send>>;

/// Produces one remote push. Called at push time, so it should read the
/// latest local value rather than capture a stale one.
pub type PushFn = Arc<dyn Fn() -> PushFuture + Send + Sync>;

#[derive(Default)]
struct PendingTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
    /// A debounced push is running for the key
    pushing: bool,
    /// Follow-up push requested while one was running
    queued: Option<PushFn>,
}

struct Channel {
    key: String,
    pending: Mutex<PendingTimer>,
    push_lock: tokio::sync::Mutex<()>,
    status: watch::Sender<SyncStatus>,
    /// Bumped on every status change so stale Idle resets are ignored
    status_generation: AtomicU64,
}

impl Channel {
    fn new(key: &str) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            key: key.to_string(),
            pending: Mutex::new(PendingTimer::default()),
            push_lock: tokio::sync::Mutex::new(()),
            status,
            status_generation: AtomicU64::new(0),
        }
    }

    fn pending(&self) -> MutexGuard<'_, PendingTimer> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: SyncStatus) -> u64 {
        let generation = self.status_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.status.send_replace(status);
        generation
    }

    /// Abort the pending timer and drop any queued follow-up.
    /// Returns true if either existed.
    fn cancel_pending(&self) -> bool {
        let mut pending = self.pending();
        pending.generation += 1;
        let queued = pending.queued.take().is_some();
        match pending.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => queued,
        }
    }
}

struct SchedulerInner {
    channels: Mutex<HashMap<String, Arc<Channel>>>,
    status_display: Duration,
}

#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
}

impl SyncScheduler {
    /// `status_display` is how long SYNCED/ERROR stays before reverting to IDLE
    pub fn new(status_display: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                channels: Mutex::new(HashMap::new()),
                status_display,
            }),
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, Arc<Channel>>> {
        self.inner.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn channel(&self, key: &str) -> Arc<Channel> {
        self.channels()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Channel::new(key)))
            .clone()
    }

    /// Schedule a trailing-edge debounced push for `key`.
    ///
    /// Restarts the window if a push is already pending for the key.
    pub fn schedule(&self, key: &str, window: Duration, push: PushFn) {
        let channel = self.channel(key);
        let status_display = self.inner.status_display;

        let mut pending = channel.pending();
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }
        pending.generation += 1;
        let generation = pending.generation;

        let timer_channel = channel.clone();
        pending.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            {
                let mut pending = timer_channel.pending();
                if pending.generation != generation {
                    return;
                }
                pending.handle = None;
                if pending.pushing {
                    debug!(key = %timer_channel.key, "Push in flight, follow-up queued");
                    pending.queued = Some(push);
                    return;
                }
                pending.pushing = true;
            }
            tokio::spawn(drain(timer_channel, push, status_display));
        }));
        debug!(key, window_ms = window.as_millis() as u64, "Push scheduled");
    }

    /// Push now, bypassing the debounce window.
    ///
    /// Waits for any in-flight push on the key to settle first. The push runs
    /// on its own task, so dropping the returned future does not cancel it.
    pub async fn flush(&self, key: &str, push: PushFn) -> SyncOutcome {
        let channel = self.channel(key);
        channel.cancel_pending();
        tokio::spawn(run_push(channel, push, self.inner.status_display))
            .await
            .unwrap_or(SyncOutcome::Failure)
    }

    /// Cancel the pending timer for `key`. In-flight pushes are unaffected.
    pub fn cancel(&self, key: &str) {
        let channel = self.channels().get(key).cloned();
        if let Some(channel) = channel {
            if channel.cancel_pending() {
                debug!(key, "Pending push cancelled");
            }
        }
    }

    /// Cancel every pending timer (session teardown)
    pub fn cancel_all(&self) {
        let channels: Vec<Arc<Channel>> = self.channels().values().cloned().collect();
        for channel in channels {
            channel.cancel_pending();
        }
    }

    pub fn has_pending(&self, key: &str) -> bool {
        self.channels()
            .get(key)
            .map(|channel| {
                let pending = channel.pending();
                pending.handle.is_some() || pending.queued.is_some()
            })
            .unwrap_or(false)
    }

    pub fn status(&self, key: &str) -> SyncStatus {
        self.channels()
            .get(key)
            .map(|channel| *channel.status.borrow())
            .unwrap_or_default()
    }

    pub fn subscribe(&self, key: &str) -> watch::Receiver<SyncStatus> {
        self.channel(key).status.subscribe()
    }
}

/// Run a debounced push, then any follow-up queued while it ran
async fn drain(channel: Arc<Channel>, mut push: PushFn, status_display: Duration) {
    loop {
        run_push(channel.clone(), push, status_display).await;

        let next = {
            let mut pending = channel.pending();
            match pending.queued.take() {
                Some(next) => next,
                None => {
                    pending.pushing = false;
                    return;
                }
            }
        };
        push = next;
    }
}

async fn run_push(channel: Arc<Channel>, push: PushFn, status_display: Duration) -> SyncOutcome {
    let _in_flight = channel.push_lock.lock().await;
    channel.set_status(SyncStatus::Syncing);

    let (status, outcome) = match push().await {
        Ok(()) => {
            debug!(key = %channel.key, "Push succeeded");
            (SyncStatus::Synced, SyncOutcome::Success)
        }
        Err(e) => {
            warn!(key = %channel.key, issue = %SyncIssue::ReplicationFailure, "Push failed: {}", e);
            (SyncStatus::Error, SyncOutcome::Failure)
        }
    };

    let generation = channel.set_status(status);
    let reset_channel = channel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(status_display).await;
        if reset_channel.status_generation.load(Ordering::SeqCst) == generation {
            reset_channel.set_status(SyncStatus::Idle);
        }
    });

    outcome
}
