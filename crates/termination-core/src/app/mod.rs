//! App - アプリケーション層
//!
//! ports を組み合わせて終了検出のプロトコルを実装します。
//!
//! # 主要コンポーネント
//! - **TaskRegistry**: タスクの登録（create-once）
//! - **TaskCompleter**: CREATED から FINISHED / ABORTED への遷移
//! - **ProcessStatusResolver**: プロセス状態の導出
//! - **DetectorBuilder / Detector**: 3 つをまとめたワイヤリング

pub mod builder;
pub mod completer;
pub mod registry;
pub mod resolver;

#[cfg(test)]
mod test_support;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, Detector, DetectorBuilder};
pub use self::completer::TaskCompleter;
pub use self::registry::TaskRegistry;
pub use self::resolver::ProcessStatusResolver;
