//! End-to-end tests for session bootstrap, the progress ledger and slice sync
//!
//! All tests run on paused Tokio time so debounce windows and timeouts are
//! deterministic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use stride_common::cache::{slice_key, CacheExt, GUEST_ID_KEY};
use stride_common::{
    AchievementEvent, ActorIdentity, ActorProfile, HostIdentity, MemoryCache, SqliteCache,
    StrideConfig, SyncIssue, SyncOutcome, SyncStatus,
};
use stride_sync::{MemoryRemoteStore, Session};
use tokio::time::sleep;

fn fresh() -> (Arc<MemoryRemoteStore>, Arc<MemoryCache>) {
    (Arc::new(MemoryRemoteStore::new()), Arc::new(MemoryCache::new()))
}

async fn bootstrap(
    store: &Arc<MemoryRemoteStore>,
    cache: &Arc<MemoryCache>,
    hint: Option<&HostIdentity>,
) -> Session {
    Session::bootstrap(&StrideConfig::default(), cache.clone(), store.clone(), hint).await
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Habits {
    names: Vec<String>,
}

// ============================================================================
// Progress ledger
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_event_applies_exactly_once() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;
    let event = AchievementEvent::new("t6", 150, 20);

    let first = session.apply_event(&event);
    assert_eq!(first.xp, 150);
    assert_eq!(first.coins, 120);
    assert_eq!(first.level, 1);
    assert!(first.has_completed("t6"));

    let second = session.apply_event(&event);
    assert_eq!(second, first);

    sleep(Duration::from_millis(100)).await;
    let actor_id = session.identity().id.clone();
    assert!(store.has_event(&actor_id, "t6"));
    assert_eq!(store.profile(&actor_id).unwrap().xp, 150);
    assert_eq!(store.calls("record_event"), 1);
    assert_eq!(session.ledger().pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_level_tracks_xp_over_many_events() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;

    for i in 0..40u64 {
        let event = AchievementEvent::new(&format!("lesson-{}", i), 37 + i * 11, 5);
        let profile = session.ledger().apply_event_on(&event, day(1));
        assert!(profile.level_is_consistent(500), "inconsistent at event {}", i);
        assert_eq!(profile.level, profile.xp / 500 + 1);
    }

    let profile = session.profile();
    assert_eq!(profile.completed_event_ids.len(), 40);
    assert_eq!(profile.coins, 100 + 40 * 5);
}

#[tokio::test(start_paused = true)]
async fn test_event_completed_on_another_device_is_not_reapplied() {
    let (store, cache) = fresh();
    let hint = HostIdentity::new(4242u64, "Mo");
    let mut remote = ActorProfile::new(ActorIdentity::host(&hint), 100);
    remote.completed_event_ids.insert("t6".to_string());
    remote.xp = 150;
    remote.coins = 120;
    store.insert_profile(remote);
    store.insert_event("4242", "t6");

    let session = bootstrap(&store, &cache, Some(&hint)).await;
    let profile = session.apply_event(&AchievementEvent::new("t6", 150, 20));

    assert_eq!(profile.xp, 150);
    assert_eq!(profile.coins, 120);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(store.calls("record_event"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_new_guest_with_unreachable_remote_runs_degraded() {
    let (store, cache) = fresh();
    store.set_offline(true);

    let session = bootstrap(&store, &cache, None).await;
    assert!(session.is_degraded());
    assert_eq!(session.issues(), &[SyncIssue::IdentityResolutionFailure]);

    let profile = session.profile();
    assert_eq!(profile.xp, 0);
    assert_eq!(profile.coins, 100);
    assert_eq!(profile.level, 1);

    // Mutations still commit locally while degraded.
    let after = session.apply_event(&AchievementEvent::new("first-run", 30, 10));
    assert_eq!(after.xp, 30);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(session.ledger().status(), SyncStatus::Error);
    assert_eq!(session.ledger().pending_count(), 1);

    store.set_offline(false);
    assert_eq!(session.ledger().force_sync().await, SyncOutcome::Success);
    assert!(!session.is_degraded());
    assert_eq!(session.ledger().pending_count(), 0);

    let remote = store.profile(&session.identity().id).unwrap();
    assert_eq!(remote.xp, 30);
    assert_eq!(remote.coins, 110);
}

#[tokio::test(start_paused = true)]
async fn test_unreplicated_events_survive_restart() {
    let (store, cache) = fresh();
    let hint = HostIdentity::new("u-5", "Sam");

    {
        let session = bootstrap(&store, &cache, Some(&hint)).await;
        store.set_offline(true);
        session.apply_event(&AchievementEvent::new("quiz-1", 80, 0));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(session.ledger().pending_count(), 1);
    }

    store.set_offline(false);
    let session = bootstrap(&store, &cache, Some(&hint)).await;
    sleep(Duration::from_millis(100)).await;

    assert!(store.has_event("u-5", "quiz-1"));
    assert_eq!(store.profile("u-5").unwrap().xp, 80);
    assert_eq!(session.ledger().pending_count(), 0);
}

// ============================================================================
// Slice synchronizer
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_writes_within_window_coalesce_into_one_push() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;
    let habits = session.slice("habits", Habits { names: vec![] });
    tokio::task::yield_now().await;

    let third = Habits {
        names: vec!["walk".into(), "read".into(), "stretch".into()],
    };
    habits.write(Habits {
        names: vec!["walk".into()],
    });
    sleep(Duration::from_millis(300)).await;
    habits.write(Habits {
        names: vec!["walk".into(), "read".into()],
    });
    sleep(Duration::from_millis(300)).await;
    habits.write(third.clone());
    assert_eq!(habits.status(), SyncStatus::Idle);

    sleep(Duration::from_millis(1500)).await;

    let pushes = store.pushes("habits");
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0], serde_json::to_value(&third).unwrap());
    assert_eq!(habits.status(), SyncStatus::Synced);

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(habits.status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_read_is_local_first_with_hanging_remote() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;
    cache.set_json(&slice_key("goals"), &json!({ "daily": 4 }));
    store.set_hanging(true);

    let goals = session.slice("goals", json!({ "daily": 1 }));
    assert_eq!(goals.read(), json!({ "daily": 4 }));

    sleep(Duration::from_secs(10)).await;
    assert_eq!(goals.read(), json!({ "daily": 4 }));
}

#[tokio::test(start_paused = true)]
async fn test_remote_value_is_adopted_and_published() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;
    let actor_id = session.identity().id.clone();
    store.insert_slice(&actor_id, "goals", json!({ "daily": 3 }));

    let goals = session.slice("goals", json!({ "daily": 1 }));
    let mut changes = goals.subscribe();
    assert_eq!(goals.read(), json!({ "daily": 1 }));

    changes.changed().await.unwrap();
    assert_eq!(*changes.borrow(), json!({ "daily": 3 }));
    assert_eq!(goals.read(), json!({ "daily": 3 }));
    assert_eq!(
        cache.get_json::<Value>(&slice_key("goals")),
        Some(json!({ "daily": 3 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_local_write_wins_over_late_remote_value() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;
    let actor_id = session.identity().id.clone();
    store.insert_slice(&actor_id, "goals", json!({ "daily": 3 }));

    let goals = session.slice("goals", json!({ "daily": 1 }));
    goals.write(json!({ "daily": 7 }));

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(goals.read(), json!({ "daily": 7 }));
    assert_eq!(store.slice(&actor_id, "goals"), Some(json!({ "daily": 7 })));
}

#[tokio::test(start_paused = true)]
async fn test_local_only_slice_is_pushed_after_open() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;
    cache.set_json(&slice_key("notes"), &json!(["offline note"]));

    let _notes = session.slice("notes", json!([]));
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(store.pushes("notes"), vec![json!(["offline note"])]);
}

#[tokio::test(start_paused = true)]
async fn test_pushes_for_one_slice_never_overlap() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;
    store.set_push_delay(Some(Duration::from_millis(3000)));

    let counter = session.slice("counter", 0u32);
    tokio::task::yield_now().await;
    counter.write(1);
    sleep(Duration::from_millis(1100)).await;
    counter.write(2);
    sleep(Duration::from_millis(1100)).await;
    sleep(Duration::from_millis(5000)).await;

    assert_eq!(store.max_pushes_in_flight(), 1);
    assert_eq!(store.pushes("counter"), vec![json!(1), json!(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_force_sync_failure_is_not_retried() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;
    let streak = session.slice("streak", 0u32);
    tokio::task::yield_now().await;

    store.set_offline(true);
    streak.write(5);
    assert_eq!(streak.force_sync().await, SyncOutcome::Failure);
    assert_eq!(streak.status(), SyncStatus::Error);
    assert_eq!(streak.read(), 5);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(store.calls("push_slice"), 1);
    assert_eq!(streak.status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_slice_cancels_pending_push() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;

    {
        let habits = session.slice("habits", json!([]));
        tokio::task::yield_now().await;
        habits.write(json!(["swim"]));
    }

    sleep(Duration::from_secs(3)).await;
    assert_eq!(store.calls("push_slice"), 0);
    assert_eq!(
        cache.get_json::<Value>(&slice_key("habits")),
        Some(json!(["swim"]))
    );
}

#[tokio::test(start_paused = true)]
async fn test_slices_sync_independently() {
    let (store, cache) = fresh();
    let session = bootstrap(&store, &cache, None).await;
    let a = session.slice("a", 0u32);
    let b = session.slice("b", 0u32);
    tokio::task::yield_now().await;

    a.write(1);
    sleep(Duration::from_millis(600)).await;
    b.write(2);
    sleep(Duration::from_millis(500)).await;

    assert_eq!(store.pushes("a"), vec![json!(1)]);
    assert!(store.pushes("b").is_empty());

    sleep(Duration::from_millis(600)).await;
    assert_eq!(store.pushes("b"), vec![json!(2)]);
}

// ============================================================================
// Durable cache
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_guest_identity_survives_sqlite_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let store = Arc::new(MemoryRemoteStore::new());

    let first = {
        let cache = Arc::new(SqliteCache::open(&path).unwrap());
        let session =
            Session::bootstrap(&StrideConfig::default(), cache, store.clone(), None).await;
        session.apply_event(&AchievementEvent::new("intro", 40, 0));
        sleep(Duration::from_millis(100)).await;
        session.identity().id.clone()
    };

    let cache = Arc::new(SqliteCache::open(&path).unwrap());
    assert_eq!(cache.get_json::<String>(GUEST_ID_KEY), Some(first.clone()));
    let session = Session::bootstrap(&StrideConfig::default(), cache, store, None).await;

    assert_eq!(session.identity().id, first);
    assert!(session.profile().has_completed("intro"));
    assert_eq!(session.profile().xp, 40);
}

#[tokio::test(start_paused = true)]
async fn test_writes_during_slow_push_send_only_the_latest_value() {
    let (store, cache) = fresh();
    let mut config = StrideConfig::default();
    config.remote.timeout_ms = 30_000;
    let session = Session::bootstrap(&config, cache.clone(), store.clone(), None).await;
    store.set_push_delay(Some(Duration::from_millis(5_000)));

    let counter = session.slice("counter", 0u32);
    tokio::task::yield_now().await;
    for value in 1..=4u32 {
        counter.write(value);
        sleep(Duration::from_millis(1_100)).await;
    }
    sleep(Duration::from_secs(20)).await;

    assert_eq!(store.pushes("counter"), vec![json!(1), json!(4)]);
    assert_eq!(store.max_pushes_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unpushed_write_survives_next_session() {
    let (store, cache) = fresh();
    let hint = HostIdentity::new("u-9", "Lee");

    {
        let session = bootstrap(&store, &cache, Some(&hint)).await;
        store.insert_slice("u-9", "goals", json!({ "v": 1 }));
        let goals = session.slice("goals", json!({ "v": 0 }));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(goals.read(), json!({ "v": 1 }));

        goals.write(json!({ "v": 2 }));
    }
    assert_eq!(store.calls("push_slice"), 0);

    let session = bootstrap(&store, &cache, Some(&hint)).await;
    let goals = session.slice("goals", json!({ "v": 0 }));
    sleep(Duration::from_millis(10)).await;
    assert_eq!(goals.read(), json!({ "v": 2 }));

    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(store.slice("u-9", "goals"), Some(json!({ "v": 2 })));
    assert_eq!(goals.read(), json!({ "v": 2 }));
}

#[tokio::test(start_paused = true)]
async fn test_acknowledged_slice_adopts_newer_remote_value() {
    let (store, cache) = fresh();
    let hint = HostIdentity::new("u-10", "Ira");

    {
        let session = bootstrap(&store, &cache, Some(&hint)).await;
        let goals = session.slice("goals", json!({ "v": 0 }));
        tokio::task::yield_now().await;
        goals.write(json!({ "v": 2 }));
        assert_eq!(goals.force_sync().await, SyncOutcome::Success);
    }

    // Another device moved the slice on after our push was acknowledged.
    store.insert_slice("u-10", "goals", json!({ "v": 3 }));

    let session = bootstrap(&store, &cache, Some(&hint)).await;
    let goals = session.slice("goals", json!({ "v": 0 }));
    sleep(Duration::from_millis(10)).await;
    assert_eq!(goals.read(), json!({ "v": 3 }));
}
