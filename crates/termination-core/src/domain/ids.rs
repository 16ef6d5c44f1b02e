//! Domain identifiers (strongly-typed IDs).
//!
//! Process と Task の ID は呼び出し側が決める文字列です。
//! `Id<T>` というジェネリック型で共通実装を提供しつつ、`T` は PhantomData の
//! マーカー型として ProcessId と TaskId の混同をコンパイル時に防ぎます。

use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
///
/// エラーメッセージやログで使う種別名（"process", "task"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn kind() -> &'static str;
}

/// Returned when a caller-supplied identifier is unusable as a storage key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id: {reason}")]
pub struct InvalidId {
    pub kind: &'static str,
    pub reason: &'static str,
}

/// ジェネリック ID 型
///
/// # 例
/// ```
/// use termination_core::domain::{ProcessId, TaskId};
///
/// let process_id = ProcessId::parse("p1").unwrap();
/// let task_id = TaskId::parse("t1").unwrap();
/// assert_eq!(process_id.as_str(), "p1");
/// assert_eq!(task_id.to_string(), "t1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Validate and wrap a caller-supplied identifier.
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidId> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(InvalidId {
                kind: T::kind(),
                reason: "must not be empty",
            });
        }
        Ok(Self {
            value,
            _marker: PhantomData,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdMarker> TryFrom<String> for Id<T> {
    type Error = InvalidId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl<T: IdMarker> TryFrom<&str> for Id<T> {
    type Error = InvalidId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Process のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Process {}

impl IdMarker for Process {
    fn kind() -> &'static str {
        "process"
    }
}

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn kind() -> &'static str {
        "task"
    }
}

/// Identifier shared by every task of one process (the partition key).
pub type ProcessId = Id<Process>;

/// Identifier of a task within its process (the sort key of the base table).
pub type TaskId = Id<Task>;

/// Full identity of a stored task record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub process_id: ProcessId,
    pub task_id: TaskId,
}

impl TaskKey {
    pub fn new(process_id: ProcessId, task_id: TaskId) -> Self {
        Self {
            process_id,
            task_id,
        }
    }

    /// Parse both halves of a key from raw strings (e.g. HTTP path parameters).
    pub fn parse(process_id: impl Into<String>, task_id: impl Into<String>) -> Result<Self, InvalidId> {
        Ok(Self::new(ProcessId::parse(process_id)?, TaskId::parse(task_id)?))
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.process_id, self.task_id)
    }
}
