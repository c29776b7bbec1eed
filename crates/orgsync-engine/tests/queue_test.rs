//! Operation queue tests: ordering, archival and retention.

mod common;

use chrono::Duration;
use common::*;
use orgsync_core::{EntityKind, OperationType};
use orgsync_db::{ArchiveOutcome, Resolution, DEFAULT_PRIORITY};

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_lower_priority_value_is_fetched_first() {
    for order in [[5, 10], [10, 5]] {
        let queue = queue().await;
        for (i, priority) in order.iter().enumerate() {
            let n = u32::try_from(i).unwrap() + 1;
            queue
                .save(unit(n, "Unit"), OperationType::Update, false, *priority, &cvr())
                .await
                .unwrap();
        }

        let batch = queue.dequeue_batch(EntityKind::OrgUnit, 10).await.unwrap();
        assert_eq!(batch[0].priority, 5);
        assert_eq!(batch[1].priority, 10);
    }
}

#[tokio::test]
async fn test_later_higher_priority_entry_overtakes() {
    let queue = queue().await;
    let a = uuid(0xA);
    let b = uuid(0xB);
    queue
        .save(unit(0xA, "A"), OperationType::Update, false, 10, &cvr())
        .await
        .unwrap();
    queue
        .save(unit(0xB, "B"), OperationType::Update, false, 5, &cvr())
        .await
        .unwrap();

    let batch = queue.dequeue_batch(EntityKind::OrgUnit, 10).await.unwrap();
    let order: Vec<_> = batch.iter().map(|e| e.uuid()).collect();
    assert_eq!(order, vec![b, a]);
}

#[tokio::test]
async fn test_equal_priority_keeps_insertion_order() {
    let queue = queue().await;
    for n in 1..=5 {
        queue
            .save(unit(n, "Unit"), OperationType::Update, false, DEFAULT_PRIORITY, &cvr())
            .await
            .unwrap();
    }

    let batch = queue.dequeue_batch(EntityKind::OrgUnit, 3).await.unwrap();
    let order: Vec<_> = batch.iter().map(|e| e.uuid()).collect();
    assert_eq!(order, vec![uuid(1), uuid(2), uuid(3)]);
}

#[tokio::test]
async fn test_duplicate_saves_are_kept() {
    let queue = queue().await;
    for _ in 0..2 {
        queue
            .save(unit(1, "IT"), OperationType::Update, false, DEFAULT_PRIORITY, &cvr())
            .await
            .unwrap();
    }
    assert_eq!(queue.pending(EntityKind::OrgUnit, uuid(1)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_saves_are_all_persisted() {
    let queue = queue().await;
    let saves = (1..=20).map(|n| {
        let queue = queue.clone();
        async move {
            queue
                .save(user(n, &format!("u{n}"), 1), OperationType::Update, false, DEFAULT_PRIORITY, &cvr())
                .await
        }
    });
    let results = futures::future::join_all(saves).await;
    assert!(results.iter().all(Result::is_ok));

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.for_kind(EntityKind::User).unwrap().pending, 20);
    assert_eq!(stats.total_pending(), 20);
}

// ============================================================================
// Archival
// ============================================================================

#[tokio::test]
async fn test_complete_moves_entry_to_archive() {
    let queue = queue().await;
    let entry = queue
        .save(user(10, "jdoe", 1), OperationType::Update, false, DEFAULT_PRIORITY, &cvr())
        .await
        .unwrap();

    queue
        .complete(&entry, &Resolution::Success { skipped: true }, t0())
        .await
        .unwrap();

    assert!(queue.pending(EntityKind::User, uuid(10)).await.unwrap().is_empty());
    let archived = queue
        .archived(EntityKind::User, ArchiveOutcome::Success, uuid(10))
        .await
        .unwrap();
    assert_eq!(archived.len(), 1);
    assert!(archived[0].skipped);
    assert_eq!(archived[0].archived_at, t0());
    assert_eq!(archived[0].registration, entry.registration);
}

// ============================================================================
// Retention
// ============================================================================

#[tokio::test]
async fn test_retention_purges_old_successes_only() {
    let queue = queue().await;
    let now = t0();
    let mut entries = Vec::new();
    for n in 1..=3 {
        entries.push(
            queue
                .save(unit(n, "Unit"), OperationType::Update, false, DEFAULT_PRIORITY, &cvr())
                .await
                .unwrap(),
        );
    }

    let success = Resolution::Success { skipped: false };
    queue
        .complete(&entries[0], &success, now - Duration::days(8))
        .await
        .unwrap();
    queue
        .complete(&entries[1], &success, now - Duration::days(1))
        .await
        .unwrap();
    queue
        .complete(
            &entries[2],
            &Resolution::Failure {
                error: "rejected".into(),
            },
            now - Duration::days(30),
        )
        .await
        .unwrap();

    let purged = queue
        .retention_cleanup(now, Duration::days(7))
        .await
        .unwrap();
    assert_eq!(purged, 1);

    let stats = queue.stats().await.unwrap();
    let ou = stats.for_kind(EntityKind::OrgUnit).unwrap();
    assert_eq!(ou.succeeded, 1);
    assert_eq!(ou.failed, 1);
}
