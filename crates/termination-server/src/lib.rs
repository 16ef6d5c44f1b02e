//! termination-server
//!
//! HTTP front end (axum) for termination-core, plus a reqwest client for it.
//!
//! # モジュール構成
//! - **api**: ルーティング、ハンドラ、ワイヤ型
//! - **client**: DetectorClient（SDK）
//! - **config**: 環境変数からの設定
//! - **error**: ApiError（IntoResponse）
//! - **middleware**: リクエスト ID 付きの tracing span
//! - **telemetry**: tracing-subscriber の初期化

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod telemetry;

use std::sync::Arc;

use termination_core::impls::{InMemoryTaskStore, SqliteTaskStore};
use termination_core::ports::TaskStore;
use termination_core::{Detector, DetectorBuilder};

pub use self::api::router;
pub use self::client::{ClientError, DetectorClient};
pub use self::config::{Config, ConfigError};

/// Open the configured store and wire a [`Detector`] over it.
pub async fn build_detector(config: &Config) -> anyhow::Result<Detector> {
    let store: Arc<dyn TaskStore> = match config.store_backend() {
        config::StoreBackend::InMemory => Arc::new(InMemoryTaskStore::new()),
        config::StoreBackend::Sqlite(url) => Arc::new(SqliteTaskStore::connect(&url).await?),
    };

    let detector = DetectorBuilder::new()
        .store(store)
        .retention(config.tasks_storing_duration)
        .build()?;
    Ok(detector)
}
