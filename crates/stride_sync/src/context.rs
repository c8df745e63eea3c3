//! Per-session capabilities handed to the ledger and every slice synchronizer

use crate::remote::RemoteClient;
use crate::scheduler::SyncScheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stride_common::{LocalCache, SyncConfig};
use tracing::info;

#[derive(Clone)]
pub struct SyncContext {
    pub actor_id: String,
    pub cache: Arc<dyn LocalCache>,
    pub remote: RemoteClient,
    pub scheduler: SyncScheduler,
    pub sync: SyncConfig,
    degraded: Arc<AtomicBool>,
}

impl SyncContext {
    pub fn new(
        actor_id: &str,
        cache: Arc<dyn LocalCache>,
        remote: RemoteClient,
        scheduler: SyncScheduler,
        sync: SyncConfig,
        degraded: bool,
    ) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            cache,
            remote,
            scheduler,
            sync,
            degraded: Arc::new(AtomicBool::new(degraded)),
        }
    }

    /// True while the session has not reached the remote store
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Record that the remote store answered again
    pub fn mark_online(&self) {
        if self.degraded.swap(false, Ordering::SeqCst) {
            info!(actor_id = %self.actor_id, "Remote store reachable again, leaving degraded mode");
        }
    }
}
