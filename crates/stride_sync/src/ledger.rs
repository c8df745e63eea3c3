//! Progress Ledger - exactly-once reward application
//!
//! `apply_event` commits to the local cache synchronously and returns the new
//! profile immediately. Replication runs afterwards through the scheduler on
//! the `stride.ledger` channel:
//!
//! 1. make sure the remote profile exists (merging it in if it diverged),
//! 2. record each pending event keyed by (actor, event),
//! 3. write the absolute aggregate fields.
//!
//! Events stay in the durable pending queue until replication succeeds, so a
//! failed attempt is retried on the next mutation, on `force_sync`, or in the
//! next session.

use crate::context::SyncContext;
use crate::remote::RemoteError;
use crate::scheduler::{PushFn, PushFuture};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use stride_common::cache::{CacheExt, PENDING_EVENTS_KEY, PROFILE_KEY};
use stride_common::{
    AchievementEvent, ActorProfile, ProgressConfig, SyncIssue, SyncOutcome, SyncStatus,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Scheduler channel used for ledger replication
pub const LEDGER_CHANNEL: &str = "stride.ledger";

/// Cache key of the pending replication queue for one actor
pub fn pending_events_key(actor_id: &str) -> String {
    format!("{}.{}", PENDING_EVENTS_KEY, actor_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PendingEvent {
    pub event_id: String,
    /// The remote event record exists but the aggregate write is unconfirmed
    #[serde(default)]
    pub recorded: bool,
}

impl PendingEvent {
    pub(crate) fn new(event_id: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            recorded: false,
        }
    }
}

struct LedgerState {
    profile: ActorProfile,
    pending: Vec<PendingEvent>,
}

struct LedgerInner {
    ctx: SyncContext,
    progress: ProgressConfig,
    state: Mutex<LedgerState>,
    remote_profile_confirmed: AtomicBool,
}

#[derive(Clone)]
pub struct ProgressLedger {
    inner: Arc<LedgerInner>,
}

impl ProgressLedger {
    /// Build the ledger around a resolved profile.
    ///
    /// `remote_profile_confirmed` is true when resolution saw the remote
    /// profile. Leftover pending events from an earlier session are
    /// scheduled for replication straight away.
    pub fn new(
        ctx: SyncContext,
        progress: ProgressConfig,
        profile: ActorProfile,
        remote_profile_confirmed: bool,
    ) -> Self {
        let pending: Vec<PendingEvent> = ctx
            .cache
            .get_json(&pending_events_key(&profile.identity.id))
            .unwrap_or_default();
        let has_pending = !pending.is_empty();

        let ledger = Self {
            inner: Arc::new(LedgerInner {
                ctx,
                progress,
                state: Mutex::new(LedgerState { profile, pending }),
                remote_profile_confirmed: AtomicBool::new(remote_profile_confirmed),
            }),
        };

        if has_pending {
            info!(
                actor_id = %ledger.inner.ctx.actor_id,
                pending = ledger.pending_count(),
                "Retrying unreplicated events from a previous session"
            );
            ledger.schedule_replication();
        }
        ledger
    }

    /// Apply an achievement event once, dated today
    pub fn apply_event(&self, event: &AchievementEvent) -> ActorProfile {
        self.apply_event_on(event, Utc::now().date_naive())
    }

    /// Apply an achievement event once, dated `today` for streak tracking.
    ///
    /// A repeated event id is a no-op that returns the unchanged profile.
    pub fn apply_event_on(&self, event: &AchievementEvent, today: NaiveDate) -> ActorProfile {
        let snapshot = {
            let mut state = self.inner.state();
            let applied =
                state
                    .profile
                    .apply_event(event, today, self.inner.progress.level_xp_unit);
            if !applied {
                debug!(
                    actor_id = %self.inner.ctx.actor_id,
                    event_id = %event.event_id,
                    issue = %SyncIssue::DuplicateEventSuppressed,
                    "Event already completed"
                );
                return state.profile.clone();
            }

            state.pending.push(PendingEvent::new(&event.event_id));
            self.inner.persist(&state);
            state.profile.clone()
        };

        info!(
            actor_id = %self.inner.ctx.actor_id,
            event_id = %event.event_id,
            xp = snapshot.xp,
            coins = snapshot.coins,
            level = snapshot.level,
            "Event applied locally"
        );
        self.schedule_replication();
        snapshot
    }

    /// Current local profile snapshot
    pub fn profile(&self) -> ActorProfile {
        self.inner.state().profile.clone()
    }

    /// Events committed locally but not yet replicated
    pub fn pending_count(&self) -> usize {
        self.inner.state().pending.len()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.ctx.scheduler.status(LEDGER_CHANNEL)
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.ctx.scheduler.subscribe(LEDGER_CHANNEL)
    }

    /// Replicate now instead of waiting for the debounce window
    pub async fn force_sync(&self) -> SyncOutcome {
        self.inner
            .ctx
            .scheduler
            .flush(LEDGER_CHANNEL, self.push_fn())
            .await
    }

    fn schedule_replication(&self) {
        self.inner.ctx.scheduler.schedule(
            LEDGER_CHANNEL,
            self.inner.ctx.sync.ledger_debounce(),
            self.push_fn(),
        );
    }

    fn push_fn(&self) -> PushFn {
        let inner = self.inner.clone();
        Arc::new(move || -> PushFuture {
            let inner = inner.clone();
            Box::pin(async move { inner.replicate().await })
        })
    }
}

impl LedgerInner {
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, state: &LedgerState) {
        let cache = &self.ctx.cache;
        cache.set_json(PROFILE_KEY, &state.profile);
        cache.set_json(&pending_events_key(&state.profile.identity.id), &state.pending);
    }

    async fn replicate(&self) -> Result<(), RemoteError> {
        let batch = self.state().pending.clone();
        if batch.is_empty() {
            return Ok(());
        }

        self.ensure_remote_profile().await?;
        let actor_id = self.ctx.actor_id.as_str();

        for entry in batch.iter().filter(|entry| !entry.recorded) {
            let already_existed = self.ctx.remote.record_event(actor_id, &entry.event_id).await?;
            if already_existed {
                info!(
                    actor_id,
                    event_id = %entry.event_id,
                    issue = %SyncIssue::DuplicateEventSuppressed,
                    "Remote already holds event record"
                );
            }
            self.mark_recorded(&entry.event_id);
        }

        // An existing record may come from our own insert whose reply was lost,
        // so the absolute fields are written regardless.
        let fields = self.state().profile.fields();
        self.ctx.remote.update_profile(actor_id, &fields).await?;

        let mut state = self.state();
        state
            .pending
            .retain(|pending| !batch.iter().any(|done| done.event_id == pending.event_id));
        self.persist(&state);
        debug!(actor_id, replicated = batch.len(), "Ledger replicated");
        Ok(())
    }

    fn mark_recorded(&self, event_id: &str) {
        let mut state = self.state();
        if let Some(entry) = state.pending.iter_mut().find(|p| p.event_id == event_id) {
            entry.recorded = true;
        }
        self.persist(&state);
    }

    /// Make sure a remote profile exists before event records reference it.
    ///
    /// A profile created while offline is pushed now; one that diverged is
    /// merged into the local snapshot.
    async fn ensure_remote_profile(&self) -> Result<(), RemoteError> {
        if self.remote_profile_confirmed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let actor_id = self.ctx.actor_id.as_str();

        match self.ctx.remote.fetch_profile(actor_id).await? {
            Some(remote) => {
                let mut state = self.state();
                if state
                    .profile
                    .merge_from(&remote, self.progress.level_xp_unit)
                {
                    warn!(
                        actor_id,
                        issue = %SyncIssue::RemoteDivergence,
                        "Remote profile diverged while offline, merged"
                    );
                    self.persist(&state);
                }
            }
            None => {
                let snapshot = self.state().profile.clone();
                self.ctx.remote.create_profile(&snapshot).await?;
                info!(actor_id, "Created remote profile from local snapshot");
            }
        }

        self.remote_profile_confirmed.store(true, Ordering::SeqCst);
        self.ctx.mark_online();
        Ok(())
    }
}
