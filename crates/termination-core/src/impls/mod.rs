//! Impls - ポートの具体的な実装
//!
//! - `InMemoryTaskStore`: 単一プロセス内で完結するストア（テスト・開発用）
//! - `SqliteTaskStore`: sqlx + SQLite による永続ストア

pub mod inmem_store;
pub mod sqlite_store;

pub use self::inmem_store::InMemoryTaskStore;
pub use self::sqlite_store::SqliteTaskStore;
