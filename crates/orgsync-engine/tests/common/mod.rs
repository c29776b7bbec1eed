//! Common test utilities for engine tests.
//!
//! Everything runs against an in-memory SQLite database with migrations
//! applied, [`FakeRegistry`] and [`InMemoryDirectory`].

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use orgsync_core::{Cvr, ObjectUuid, OrgUnitRegistration, Position, Registration, UserRegistration};
use orgsync_db::{run_migrations, DbPool};
use orgsync_directory::ad::{guid_to_bytes, OBJECT_GUID, USER_ACCOUNT_CONTROL};
use orgsync_directory::{AttributeSet, DirectoryRecord};
use orgsync_engine::{DrainConfig, FilterConfig, OperationQueue, SyncEngine};
use orgsync_registry::FakeRegistry;

pub const CVR: &str = "29189846";
pub const ROOT: &str = "OU=Kommune,DC=kommune,DC=dk";

pub fn cvr() -> Cvr {
    CVR.parse().unwrap()
}

/// Deterministic uuid from a number.
pub fn uuid(n: u32) -> ObjectUuid {
    format!("00000000-0000-0000-0000-{n:012x}").parse().unwrap()
}

/// Fixed tick time.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub async fn queue() -> OperationQueue {
    let pool = DbPool::in_memory().await.unwrap();
    run_migrations(&pool).await.unwrap();
    OperationQueue::new(pool)
}

pub fn unit(n: u32, name: &str) -> Registration {
    OrgUnitRegistration::new(uuid(n), name).into()
}

pub fn user(n: u32, user_id: &str, org_unit: u32) -> Registration {
    UserRegistration::new(uuid(n), user_id)
        .with_position(Position {
            name: "Caseworker".into(),
            org_unit_uuid: uuid(org_unit),
            short_key: None,
        })
        .into()
}

pub fn engine(queue: &OperationQueue, registry: &Arc<FakeRegistry>) -> SyncEngine<FakeRegistry> {
    engine_with(queue, registry, DrainConfig {
        workers: 10,
        item_timeout: Duration::from_secs(5),
    })
}

pub fn engine_with(
    queue: &OperationQueue,
    registry: &Arc<FakeRegistry>,
    config: DrainConfig,
) -> SyncEngine<FakeRegistry> {
    SyncEngine::new(queue.clone(), registry.clone(), config)
}

pub fn ou_record(dn: &str, id: ObjectUuid, name: &str) -> DirectoryRecord {
    DirectoryRecord::new(
        dn,
        &["top", "organizationalUnit"],
        AttributeSet::new()
            .with(OBJECT_GUID, guid_to_bytes(id))
            .with("ou", name),
    )
}

pub fn user_record(dn: &str, id: ObjectUuid, account: &str, uac: i64) -> DirectoryRecord {
    DirectoryRecord::new(
        dn,
        &["top", "person", "organizationalPerson", "user"],
        AttributeSet::new()
            .with(OBJECT_GUID, guid_to_bytes(id))
            .with("sAMAccountName", account)
            .with("displayName", account.to_uppercase())
            .with(USER_ACCOUNT_CONTROL, uac),
    )
}

pub fn filter_config() -> FilterConfig {
    FilterConfig {
        root_dn: Some(ROOT.to_string()),
        excluded_subtrees: vec![format!("OU=Disabled,{ROOT}")],
        skip_disabled_users: true,
        ..FilterConfig::default()
    }
}
