//! Fixtures shared by the service tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::domain::TaskKey;
use crate::impls::{InMemoryTaskStore, SqliteTaskStore};
use crate::ports::{FixedClock, TaskStore};

#[derive(Debug, Clone, Copy)]
pub enum Backend {
    InMemory,
    Sqlite,
}

pub async fn store(backend: Backend) -> Arc<dyn TaskStore> {
    match backend {
        Backend::InMemory => Arc::new(InMemoryTaskStore::new()),
        Backend::Sqlite => Arc::new(SqliteTaskStore::connect("sqlite::memory:").await.unwrap()),
    }
}

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// Clock parked one hour before `noon()`.
pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(noon() - Duration::hours(1)))
}

pub fn retention() -> Duration {
    Duration::hours(12)
}

pub fn key(process: &str, task: &str) -> TaskKey {
    TaskKey::parse(process, task).unwrap()
}
