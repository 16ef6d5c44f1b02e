//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! services（app）はこの trait だけに依存し、ストレージと時計の実装は
//! 起動時に差し込まれます。

pub mod clock;
pub mod task_store;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::task_store::{
    BAD_STATE_ENTER_TIME_INDEX, IndexName, InsertOutcome, Predicate, SortCondition, SortOrder,
    StoreError, TaskStore, UpdateCondition, UpdateOutcome,
};
