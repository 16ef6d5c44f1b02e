//! termination-core
//!
//! 分散プロセスの終了検出。プロセスは呼び出し側が ID で名付けたタスクの
//! 集合で、状態は保存せずタスクレコードから毎回導出します。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, task, process, outcome）
//! - **ports**: 抽象化レイヤー（TaskStore, Clock）
//! - **app**: アプリケーションロジック（registry, completer, resolver, builder）
//! - **impls**: 実装（InMemoryTaskStore, SqliteTaskStore）
//! - **error**: DetectorError

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use self::app::{Detector, DetectorBuilder};
pub use self::error::DetectorError;
