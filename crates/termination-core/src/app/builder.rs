//! DetectorBuilder - Detector の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - store と retention は必須。足りなければ build() が BuildError を返す
//! - clock は省略時 SystemClock

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::app::completer::TaskCompleter;
use crate::app::registry::TaskRegistry;
use crate::app::resolver::ProcessStatusResolver;
use crate::domain::{
    CompletionOutcome, Process, ProcessId, RegistrationOutcome, TaskKey, TerminalState,
};
use crate::error::DetectorError;
use crate::ports::{Clock, SystemClock, TaskStore};

/// BuildError は Detector 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no task store configured")]
    MissingStore,

    #[error("no task retention window configured")]
    MissingRetention,

    #[error("task retention window must be positive, got {0}")]
    InvalidRetention(Duration),
}

/// DetectorBuilder は Detector を構築
///
/// # 使用例
/// ```
/// use std::sync::Arc;
/// use chrono::Duration;
/// use termination_core::app::DetectorBuilder;
/// use termination_core::impls::InMemoryTaskStore;
///
/// let detector = DetectorBuilder::new()
///     .store(Arc::new(InMemoryTaskStore::new()))
///     .retention(Duration::hours(12))
///     .build()
///     .unwrap();
/// # drop(detector);
/// ```
#[derive(Default)]
pub struct DetectorBuilder {
    store: Option<Arc<dyn TaskStore>>,
    clock: Option<Arc<dyn Clock>>,
    retention: Option<Duration>,
}

impl DetectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// How long stored tasks are kept after registration.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn build(self) -> Result<Detector, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let retention = self.retention.ok_or(BuildError::MissingRetention)?;
        if retention <= Duration::zero() {
            return Err(BuildError::InvalidRetention(retention));
        }
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(Detector {
            registry: TaskRegistry::new(store.clone(), clock.clone(), retention),
            completer: TaskCompleter::new(store.clone(), clock.clone()),
            resolver: ProcessStatusResolver::new(store, clock),
        })
    }
}

/// Detector は 3 つのサービスをまとめたファサード
///
/// Clone は同じ store と clock を共有します（HTTP ハンドラ間で共有する想定）。
#[derive(Clone)]
pub struct Detector {
    registry: TaskRegistry,
    completer: TaskCompleter,
    resolver: ProcessStatusResolver,
}

impl Detector {
    pub async fn register(
        &self,
        key: TaskKey,
        expiration_time: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, DetectorError> {
        self.registry.register(key, expiration_time).await
    }

    pub async fn complete(
        &self,
        key: &TaskKey,
        state: TerminalState,
        message: Option<String>,
    ) -> Result<CompletionOutcome, DetectorError> {
        self.completer.complete(key, state, message).await
    }

    pub async fn get(&self, process_id: &ProcessId) -> Result<Option<Process>, DetectorError> {
        self.resolver.get(process_id).await
    }
}
