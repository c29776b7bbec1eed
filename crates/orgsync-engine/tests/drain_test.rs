//! Drain engine tests: outcomes, backoff, deadlines and single-flight.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use common::*;
use orgsync_core::{EntityKind, OperationType, Registration};
use orgsync_db::{ArchiveOutcome, DEFAULT_PRIORITY};
use orgsync_engine::{DrainConfig, EngineError, KindStatus};
use orgsync_registry::fake::CallKind;
use orgsync_registry::FakeRegistry;

async fn save(queue: &orgsync_engine::OperationQueue, registration: Registration) {
    queue
        .save(registration, OperationType::Update, false, DEFAULT_PRIORITY, &cvr())
        .await
        .unwrap();
}

// ============================================================================
// Outcomes
// ============================================================================

#[tokio::test]
async fn test_terminal_outcomes_are_archived_and_transient_stay_queued() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.fail_permanently(uuid(2), "unit type not allowed");
    registry.fail_transiently(uuid(3), 100);
    save(&queue, unit(1, "IT")).await;
    save(&queue, unit(2, "HR")).await;
    save(&queue, unit(3, "Finance")).await;

    let engine = engine(&queue, &registry);
    let report = engine.tick_at(t0()).await.unwrap();

    let ou = report.for_kind(EntityKind::OrgUnit).unwrap();
    assert_eq!(ou.status, KindStatus::Incomplete);
    assert_eq!((ou.succeeded, ou.failed, ou.pending), (1, 1, 1));

    let success = queue
        .archived(EntityKind::OrgUnit, ArchiveOutcome::Success, uuid(1))
        .await
        .unwrap();
    assert_eq!(success.len(), 1);
    assert!(queue.pending(EntityKind::OrgUnit, uuid(1)).await.unwrap().is_empty());

    let failure = queue
        .archived(EntityKind::OrgUnit, ArchiveOutcome::Failure, uuid(2))
        .await
        .unwrap();
    assert_eq!(failure.len(), 1);
    assert!(failure[0]
        .error
        .as_deref()
        .unwrap()
        .contains("unit type not allowed"));
    assert!(queue.pending(EntityKind::OrgUnit, uuid(2)).await.unwrap().is_empty());

    assert_eq!(queue.pending(EntityKind::OrgUnit, uuid(3)).await.unwrap().len(), 1);
    for outcome in [ArchiveOutcome::Success, ArchiveOutcome::Failure] {
        assert!(queue
            .archived(EntityKind::OrgUnit, outcome, uuid(3))
            .await
            .unwrap()
            .is_empty());
    }
}

#[tokio::test]
async fn test_duplicate_updates_converge() {
    let once_queue = queue().await;
    let once_registry = Arc::new(FakeRegistry::new());
    save(&once_queue, unit(1, "IT")).await;
    engine(&once_queue, &once_registry).tick_at(t0()).await.unwrap();

    let twice_queue = queue().await;
    let twice_registry = Arc::new(FakeRegistry::new());
    save(&twice_queue, unit(1, "IT")).await;
    save(&twice_queue, unit(1, "IT")).await;
    engine(&twice_queue, &twice_registry).tick_at(t0()).await.unwrap();

    let once = once_registry.get(&cvr(), EntityKind::OrgUnit, uuid(1));
    let twice = twice_registry.get(&cvr(), EntityKind::OrgUnit, uuid(1));
    assert_eq!(once, Some(unit(1, "IT")));
    assert_eq!(once, twice);

    let archived = twice_queue
        .archived(EntityKind::OrgUnit, ArchiveOutcome::Success, uuid(1))
        .await
        .unwrap();
    assert_eq!(archived.len(), 2);
    assert_eq!(archived.iter().filter(|a| a.skipped).count(), 1);
}

#[tokio::test]
async fn test_org_units_drain_before_users() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    save(&queue, user(10, "jdoe", 1)).await;
    save(&queue, unit(1, "IT")).await;

    let report = engine(&queue, &registry).tick_at(t0()).await.unwrap();
    assert_eq!(report.succeeded(), 2);

    let kinds: Vec<_> = registry.calls().iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![EntityKind::OrgUnit, EntityKind::User]);
}

#[tokio::test]
async fn test_delete_and_deactivate_routing() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.seed(&cvr(), unit(1, "IT"));
    registry.seed(&cvr(), user(10, "jdoe", 1));

    queue
        .save(
            Registration::identity_only(EntityKind::OrgUnit, uuid(1)),
            OperationType::Delete,
            false,
            DEFAULT_PRIORITY,
            &cvr(),
        )
        .await
        .unwrap();
    queue
        .save(
            Registration::identity_only(EntityKind::User, uuid(10)),
            OperationType::Deactivate,
            false,
            DEFAULT_PRIORITY,
            &cvr(),
        )
        .await
        .unwrap();

    engine(&queue, &registry).tick_at(t0()).await.unwrap();

    let calls: Vec<_> = registry.calls().iter().map(|c| c.call).collect();
    assert_eq!(calls, vec![CallKind::Delete, CallKind::Deactivate]);
    assert!(registry.get(&cvr(), EntityKind::OrgUnit, uuid(1)).is_none());
    assert_eq!(registry.is_active(&cvr(), EntityKind::User, uuid(10)), Some(false));
}

#[tokio::test]
async fn test_deactivating_unknown_object_is_a_failure() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    queue
        .save(
            Registration::identity_only(EntityKind::User, uuid(10)),
            OperationType::Deactivate,
            false,
            DEFAULT_PRIORITY,
            &cvr(),
        )
        .await
        .unwrap();

    let engine = engine(&queue, &registry);
    let report = engine.tick_at(t0()).await.unwrap();
    assert_eq!(report.failed(), 1);
    assert_eq!(
        report.for_kind(EntityKind::User).unwrap().status,
        KindStatus::Drained
    );
    assert_eq!(engine.error_streak(), 0);
    assert!(engine.next_allowed_run(EntityKind::User).is_none());
}

#[tokio::test]
async fn test_same_object_entries_run_in_queue_order() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.set_delay(Duration::from_millis(30));
    save(&queue, unit(1, "IT")).await;
    save(&queue, unit(2, "HR")).await;
    queue
        .save(
            Registration::identity_only(EntityKind::OrgUnit, uuid(1)),
            OperationType::Delete,
            false,
            DEFAULT_PRIORITY,
            &cvr(),
        )
        .await
        .unwrap();

    let report = engine(&queue, &registry).tick_at(t0()).await.unwrap();
    assert_eq!(report.succeeded(), 3);

    let calls: Vec<_> = registry
        .calls()
        .iter()
        .filter(|c| c.uuid == uuid(1))
        .map(|c| c.call)
        .collect();
    assert_eq!(calls, vec![CallKind::Update, CallKind::Delete]);
    assert!(registry.get(&cvr(), EntityKind::OrgUnit, uuid(1)).is_none());
    assert_eq!(
        registry.get(&cvr(), EntityKind::OrgUnit, uuid(2)),
        Some(unit(2, "HR"))
    );
}

#[tokio::test]
async fn test_unresolved_entry_holds_back_later_ones_for_same_object() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.fail_transiently(uuid(1), 1);
    save(&queue, unit(1, "IT")).await;
    queue
        .save(
            Registration::identity_only(EntityKind::OrgUnit, uuid(1)),
            OperationType::Delete,
            false,
            DEFAULT_PRIORITY,
            &cvr(),
        )
        .await
        .unwrap();

    let engine = engine(&queue, &registry);
    let report = engine.tick_at(t0()).await.unwrap();

    let ou = report.for_kind(EntityKind::OrgUnit).unwrap();
    assert_eq!(ou.status, KindStatus::Incomplete);
    assert_eq!((ou.succeeded, ou.failed, ou.pending), (0, 0, 2));
    assert_eq!(registry.call_count(uuid(1)), 1);

    let pending = queue.pending(EntityKind::OrgUnit, uuid(1)).await.unwrap();
    let operations: Vec<_> = pending.iter().map(|e| e.operation).collect();
    assert_eq!(operations, vec![OperationType::Update, OperationType::Delete]);

    engine.tick_at(t0() + ChronoDuration::minutes(5)).await.unwrap();
    let calls: Vec<_> = registry.calls().iter().map(|c| c.call).collect();
    assert_eq!(
        calls,
        vec![CallKind::Update, CallKind::Update, CallKind::Delete]
    );
    assert!(queue.pending(EntityKind::OrgUnit, uuid(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bypass_cache_is_forwarded() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.seed(&cvr(), unit(1, "IT"));
    registry.seed(&cvr(), unit(2, "HR"));

    save(&queue, unit(1, "IT")).await;
    queue
        .save(unit(2, "HR"), OperationType::Update, true, DEFAULT_PRIORITY, &cvr())
        .await
        .unwrap();

    engine(&queue, &registry).tick_at(t0()).await.unwrap();

    let calls = registry.calls();
    assert!(!calls[0].bypass_cache);
    assert!(calls[1].bypass_cache);

    let cached = queue
        .archived(EntityKind::OrgUnit, ArchiveOutcome::Success, uuid(1))
        .await
        .unwrap();
    let forced = queue
        .archived(EntityKind::OrgUnit, ArchiveOutcome::Success, uuid(2))
        .await
        .unwrap();
    assert!(cached[0].skipped);
    assert!(!forced[0].skipped);
}

// ============================================================================
// Backoff
// ============================================================================

#[tokio::test]
async fn test_item_retried_until_registry_recovers() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    let c = uuid(0xC);
    registry.fail_transiently(c, 3);
    save(&queue, unit(0xC, "C")).await;

    let engine = engine(&queue, &registry);
    let mut now = t0();
    let mut pauses = Vec::new();

    for _ in 0..3 {
        let report = engine.tick_at(now).await.unwrap();
        assert_eq!(
            report.for_kind(EntityKind::OrgUnit).unwrap().status,
            KindStatus::Incomplete
        );
        assert_eq!(queue.pending(EntityKind::OrgUnit, c).await.unwrap().len(), 1);
        assert!(queue
            .archived(EntityKind::OrgUnit, ArchiveOutcome::Success, c)
            .await
            .unwrap()
            .is_empty());

        let next = engine.next_allowed_run(EntityKind::OrgUnit).unwrap();
        pauses.push((next - now).num_minutes());
        now = next;
    }
    assert_eq!(pauses, vec![5, 15, 30]);
    assert_eq!(engine.error_streak(), 6);

    let report = engine.tick_at(now).await.unwrap();
    assert_eq!(
        report.for_kind(EntityKind::OrgUnit).unwrap().status,
        KindStatus::Drained
    );
    assert!(queue.pending(EntityKind::OrgUnit, c).await.unwrap().is_empty());
    assert_eq!(
        queue
            .archived(EntityKind::OrgUnit, ArchiveOutcome::Success, c)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(engine.error_streak(), 0);
    assert_eq!(registry.call_count(c), 4);
}

#[tokio::test]
async fn test_paused_kind_is_skipped_but_others_drain() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.fail_transiently(uuid(1), 100);
    save(&queue, unit(1, "IT")).await;

    let engine = engine(&queue, &registry);
    engine.tick_at(t0()).await.unwrap();
    assert_eq!(registry.call_count(uuid(1)), 1);

    save(&queue, user(10, "jdoe", 1)).await;
    let report = engine
        .tick_at(t0() + ChronoDuration::minutes(2))
        .await
        .unwrap();

    assert_eq!(
        report.for_kind(EntityKind::OrgUnit).unwrap().status,
        KindStatus::BackedOff
    );
    assert_eq!(registry.call_count(uuid(1)), 1);
    assert_eq!(report.for_kind(EntityKind::User).unwrap().succeeded, 1);
}

#[tokio::test]
async fn test_success_in_incomplete_batch_resets_streak() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.fail_transiently(uuid(1), 100);
    save(&queue, unit(1, "IT")).await;

    let engine = engine(&queue, &registry);
    let mut now = t0();
    for _ in 0..2 {
        engine.tick_at(now).await.unwrap();
        now = engine.next_allowed_run(EntityKind::OrgUnit).unwrap();
    }
    assert_eq!(engine.error_streak(), 3);

    save(&queue, unit(2, "HR")).await;
    let report = engine.tick_at(now).await.unwrap();
    let ou = report.for_kind(EntityKind::OrgUnit).unwrap();
    assert_eq!((ou.succeeded, ou.pending), (1, 1));

    let next = engine.next_allowed_run(EntityKind::OrgUnit).unwrap();
    assert_eq!((next - now).num_minutes(), 5);
    assert_eq!(engine.error_streak(), 1);
}

#[tokio::test]
async fn test_fully_resolved_batch_resets_streak() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.fail_transiently(uuid(1), 100);
    save(&queue, unit(1, "IT")).await;

    let engine = engine(&queue, &registry);
    let mut now = t0();
    for _ in 0..2 {
        engine.tick_at(now).await.unwrap();
        now = engine.next_allowed_run(EntityKind::OrgUnit).unwrap();
    }
    assert_eq!(engine.error_streak(), 3);

    registry.fail_permanently(uuid(1), "unit type not allowed");
    let report = engine.tick_at(now).await.unwrap();
    let ou = report.for_kind(EntityKind::OrgUnit).unwrap();
    assert_eq!(ou.status, KindStatus::Drained);
    assert_eq!((ou.succeeded, ou.failed), (0, 1));

    assert_eq!(engine.error_streak(), 0);
    assert_eq!(engine.next_allowed_run(EntityKind::OrgUnit), Some(now));
}

#[tokio::test]
async fn test_streak_advances_once_per_tick() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.fail_transiently(uuid(1), 100);
    registry.fail_transiently(uuid(10), 100);
    save(&queue, unit(1, "IT")).await;
    save(&queue, user(10, "jdoe", 1)).await;

    let engine = engine(&queue, &registry);
    let report = engine.tick_at(t0()).await.unwrap();
    for kind in EntityKind::ALL {
        assert_eq!(report.for_kind(kind).unwrap().status, KindStatus::Incomplete);
    }

    let pauses: Vec<_> = EntityKind::ALL
        .iter()
        .map(|&kind| (engine.next_allowed_run(kind).unwrap() - t0()).num_minutes())
        .collect();
    assert_eq!(pauses, vec![5, 5]);
    assert_eq!(engine.error_streak(), 1);
}

// ============================================================================
// Deadlines, storage errors and single-flight
// ============================================================================

#[tokio::test]
async fn test_slow_registry_call_leaves_item_queued() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.set_delay(Duration::from_millis(300));
    save(&queue, unit(1, "IT")).await;

    let engine = engine_with(
        &queue,
        &registry,
        DrainConfig {
            workers: 4,
            item_timeout: Duration::from_millis(50),
        },
    );
    let report = engine.tick_at(t0()).await.unwrap();

    let ou = report.for_kind(EntityKind::OrgUnit).unwrap();
    assert_eq!(ou.status, KindStatus::Incomplete);
    assert_eq!(ou.pending, 1);
    assert_eq!(queue.pending(EntityKind::OrgUnit, uuid(1)).await.unwrap().len(), 1);
    assert!(queue
        .archived(EntityKind::OrgUnit, ArchiveOutcome::Failure, uuid(1))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_batches_follow_worker_width() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    for n in 1..=5 {
        save(&queue, unit(n, "Unit")).await;
    }

    let engine = engine_with(
        &queue,
        &registry,
        DrainConfig {
            workers: 2,
            item_timeout: Duration::from_secs(5),
        },
    );
    let report = engine.tick_at(t0()).await.unwrap();
    let ou = report.for_kind(EntityKind::OrgUnit).unwrap();
    assert_eq!(ou.batches, 3);
    assert_eq!(ou.succeeded, 5);
    assert_eq!(queue.stats().await.unwrap().total_pending(), 0);
}

#[tokio::test]
async fn test_storage_error_aborts_tick_and_backs_off() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    let engine = engine(&queue, &registry);
    queue.pool().close().await;

    let report = engine.tick_at(t0()).await.unwrap();
    assert!(report.aborted);
    assert_eq!(report.kinds.len(), 1);
    assert_eq!(report.kinds[0].status, KindStatus::StorageError);
    assert_eq!(
        engine.next_allowed_run(EntityKind::OrgUnit),
        Some(t0() + ChronoDuration::minutes(5))
    );
}

#[tokio::test]
async fn test_overlapping_tick_is_suppressed() {
    let queue = queue().await;
    let registry = Arc::new(FakeRegistry::new());
    registry.set_delay(Duration::from_millis(300));
    save(&queue, unit(1, "IT")).await;

    let engine = Arc::new(engine(&queue, &registry));
    let running = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.tick_at(t0()).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.is_running());
    let second = engine.tick_at(t0()).await;
    assert!(matches!(second, Err(EngineError::AlreadyRunning)));

    let first = running.await.unwrap().unwrap();
    assert_eq!(first.succeeded(), 1);
    assert!(!engine.is_running());
    assert_eq!(registry.call_count(uuid(1)), 1);
}
