//! Identity Resolver
//!
//! Produces one stable `ActorIdentity` per session and makes sure a profile
//! exists for it:
//! - host platform hint present: the host id is used as-is
//! - otherwise a guest id is read from (or generated into) the local cache
//!
//! The remote profile is fetched under a timeout. Local completed events are
//! always unioned into whatever the remote returns. If the remote cannot be
//! reached the session runs degraded from the local snapshot. Resolution
//! never fails; problems are reported through `Resolution::issues`.

use crate::ledger::{pending_events_key, PendingEvent};
use crate::remote::RemoteClient;
use std::sync::Arc;
use stride_common::cache::{CacheExt, GUEST_ID_KEY, PROFILE_KEY, UPGRADED_FROM_KEY};
use stride_common::{ActorIdentity, ActorProfile, HostIdentity, LocalCache, ProgressConfig, SyncIssue};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of session bootstrap
#[derive(Debug, Clone)]
pub struct Resolution {
    pub identity: ActorIdentity,
    pub profile: ActorProfile,
    /// The remote store could not be reached; running from the local cache
    pub degraded: bool,
    pub issues: Vec<SyncIssue>,
    /// Guest id folded into this host identity during this resolution
    pub upgraded_from: Option<String>,
}

impl Resolution {
    /// Whether resolution saw (or created) the remote profile
    pub fn remote_confirmed(&self) -> bool {
        !self.degraded
    }
}

pub struct IdentityResolver {
    cache: Arc<dyn LocalCache>,
    remote: RemoteClient,
    progress: ProgressConfig,
}

impl IdentityResolver {
    pub fn new(cache: Arc<dyn LocalCache>, remote: RemoteClient, progress: ProgressConfig) -> Self {
        Self {
            cache,
            remote,
            progress,
        }
    }

    pub async fn resolve(&self, hint: Option<&HostIdentity>) -> Resolution {
        let identity = match hint {
            Some(hint) => ActorIdentity::host(hint),
            None => ActorIdentity::guest(self.guest_id()),
        };

        let cached: Option<ActorProfile> = self.cache.get_json(PROFILE_KEY);
        let upgrade_source = cached
            .as_ref()
            .filter(|snapshot| self.needs_upgrade(&identity, snapshot))
            .cloned();
        let local = cached.filter(|snapshot| snapshot.identity.id == identity.id);

        let mut issues = Vec::new();
        let mut degraded = false;

        let mut profile = match self.remote.fetch_profile(&identity.id).await {
            Ok(Some(mut remote)) => {
                remote.identity = identity.clone();
                if let Some(local) = &local {
                    if remote.merge_from(local, self.progress.level_xp_unit) {
                        info!(
                            actor_id = %identity.id,
                            issue = %SyncIssue::RemoteDivergence,
                            "Local snapshot ahead of remote, merged"
                        );
                        issues.push(SyncIssue::RemoteDivergence);
                    }
                }
                remote
            }
            Ok(None) => {
                let profile = local.unwrap_or_else(|| self.default_profile(&identity));
                match self.remote.create_profile(&profile).await {
                    Ok(_) => debug!(actor_id = %identity.id, "Created remote profile"),
                    Err(e) => {
                        warn!(
                            actor_id = %identity.id,
                            issue = %SyncIssue::IdentityResolutionFailure,
                            "Remote profile create failed: {}", e
                        );
                        degraded = true;
                        issues.push(SyncIssue::IdentityResolutionFailure);
                    }
                }
                profile
            }
            Err(e) => {
                warn!(
                    actor_id = %identity.id,
                    issue = %SyncIssue::IdentityResolutionFailure,
                    "Remote unreachable, continuing from local cache: {}", e
                );
                degraded = true;
                issues.push(SyncIssue::IdentityResolutionFailure);
                local.unwrap_or_else(|| self.default_profile(&identity))
            }
        };
        profile.identity = identity.clone();

        let upgraded_from = upgrade_source.map(|guest| self.absorb_guest(&mut profile, &guest));

        // Every later reader sees this snapshot, even with remote calls pending.
        self.cache.set_json(PROFILE_KEY, &profile);

        info!(
            actor_id = %identity.id,
            source = ?identity.source_kind,
            degraded,
            xp = profile.xp,
            level = profile.level,
            "Identity resolved"
        );

        Resolution {
            identity,
            profile,
            degraded,
            issues,
            upgraded_from,
        }
    }

    /// Read the persisted guest id, generating and storing one if absent
    fn guest_id(&self) -> String {
        if let Some(id) = self.cache.get_json::<String>(GUEST_ID_KEY) {
            return id;
        }
        let id = format!("guest_{}", Uuid::new_v4().simple());
        self.cache.set_json(GUEST_ID_KEY, &id);
        debug!(guest_id = %id, "Generated guest id");
        id
    }

    fn default_profile(&self, identity: &ActorIdentity) -> ActorProfile {
        ActorProfile::new(identity.clone(), self.progress.starting_coins)
    }

    /// A cached guest snapshot is folded into the first host identity once
    fn needs_upgrade(&self, identity: &ActorIdentity, snapshot: &ActorProfile) -> bool {
        if identity.is_guest() || !snapshot.identity.is_guest() {
            return false;
        }
        let already: Option<String> = self.cache.get_json(UPGRADED_FROM_KEY);
        already.as_deref() != Some(snapshot.identity.id.as_str())
    }

    /// Add the guest's progress to the host profile and hand its events to
    /// the host's pending queue.
    ///
    /// Guest and host are different actors, so rewards are summed rather
    /// than maxed; see `ActorProfile::absorb` for the overlapping case.
    fn absorb_guest(&self, profile: &mut ActorProfile, guest: &ActorProfile) -> String {
        let guest_id = guest.identity.id.clone();
        profile.absorb(guest, self.progress.starting_coins, self.progress.level_xp_unit);

        let host_key = pending_events_key(&profile.identity.id);
        let guest_key = pending_events_key(&guest_id);
        let mut pending: Vec<PendingEvent> = self.cache.get_json(&host_key).unwrap_or_default();
        for event_id in &guest.completed_event_ids {
            if !pending.iter().any(|p| &p.event_id == event_id) {
                pending.push(PendingEvent::new(event_id));
            }
        }
        self.cache.set_json(&host_key, &pending);
        self.cache.remove(&guest_key);
        self.cache.set_json(UPGRADED_FROM_KEY, &guest_id);

        info!(
            actor_id = %profile.identity.id,
            guest_id = %guest_id,
            events = guest.completed_event_ids.len(),
            "Guest progress reconciled into host identity"
        );
        guest_id
    }
}
