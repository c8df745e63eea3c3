//! Session bootstrap and teardown
//!
//! One session per actor: a resolved identity, one progress ledger, and any
//! number of independent slice synchronizers sharing a scheduler.

use crate::context::SyncContext;
use crate::identity::{IdentityResolver, Resolution};
use crate::ledger::ProgressLedger;
use crate::remote::{RemoteClient, RemoteStore};
use crate::scheduler::SyncScheduler;
use crate::slice::{SlicePayload, SliceSync};
use std::sync::Arc;
use stride_common::{
    AchievementEvent, ActorIdentity, ActorProfile, HostIdentity, LocalCache, StrideConfig,
    SyncIssue,
};
use tracing::debug;

pub struct Session {
    identity: ActorIdentity,
    issues: Vec<SyncIssue>,
    upgraded_from: Option<String>,
    ctx: SyncContext,
    ledger: ProgressLedger,
}

impl Session {
    /// Resolve the actor and wire up the ledger.
    ///
    /// Never fails: an unreachable remote store yields a degraded session
    /// running from the local cache.
    pub async fn bootstrap(
        config: &StrideConfig,
        cache: Arc<dyn LocalCache>,
        store: Arc<dyn RemoteStore>,
        hint: Option<&HostIdentity>,
    ) -> Self {
        let remote = RemoteClient::new(store, config.remote.timeout());
        let resolver = IdentityResolver::new(cache.clone(), remote.clone(), config.progress.clone());
        let resolution = resolver.resolve(hint).await;
        Self::from_resolution(config, cache, remote, resolution)
    }

    fn from_resolution(
        config: &StrideConfig,
        cache: Arc<dyn LocalCache>,
        remote: RemoteClient,
        resolution: Resolution,
    ) -> Self {
        let remote_confirmed = resolution.remote_confirmed();
        let Resolution {
            identity,
            profile,
            degraded,
            issues,
            upgraded_from,
        } = resolution;

        let ctx = SyncContext::new(
            &identity.id,
            cache,
            remote,
            SyncScheduler::new(config.sync.status_display()),
            config.sync.clone(),
            degraded,
        );
        let ledger = ProgressLedger::new(ctx.clone(), config.progress.clone(), profile, remote_confirmed);

        Self {
            identity,
            issues,
            upgraded_from,
            ctx,
            ledger,
        }
    }

    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub fn profile(&self) -> ActorProfile {
        self.ledger.profile()
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    /// Shorthand for `ledger().apply_event`
    pub fn apply_event(&self, event: &AchievementEvent) -> ActorProfile {
        self.ledger.apply_event(event)
    }

    /// Open a synchronizer for the slice `key`
    pub fn slice<T: SlicePayload>(&self, key: &str, default: T) -> SliceSync<T> {
        SliceSync::open(self.ctx.clone(), key, default)
    }

    pub fn is_degraded(&self) -> bool {
        self.ctx.is_degraded()
    }

    /// True if the local cache fell back to memory-only storage
    pub fn cache_degraded(&self) -> bool {
        self.ctx.cache.is_degraded()
    }

    pub fn issues(&self) -> &[SyncIssue] {
        &self.issues
    }

    pub fn upgraded_from(&self) -> Option<&str> {
        self.upgraded_from.as_deref()
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.ctx.scheduler
    }

    /// Cancel every pending push. In-flight pushes still complete.
    pub fn shutdown(&self) {
        debug!(actor_id = %self.identity.id, "Session shutting down");
        self.ctx.scheduler.cancel_all();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.ctx.scheduler.cancel_all();
    }
}
