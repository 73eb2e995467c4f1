//! Task struct and status-transition rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{Category, TaskStatus};

/// A trackable work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: i64,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub status: TaskStatus,

    /// 1 (highest) through 5; default 3.
    pub priority: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_key: Option<String>,

    /// Position within the epic, when assigned to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_seq: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    /// Document this task was carved out of, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_doc_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Default task priority.
pub const DEFAULT_PRIORITY: i32 = 3;

/// Returns `true` if a task may move from `from` to `to`.
///
/// Every distinct pair is allowed; only the self-transition is refused.
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    from != to
}

/// Kind tag for a task-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskLogKind {
    StatusChange,
    Note,
}

impl TaskLogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusChange => "status_change",
            Self::Note => "note",
        }
    }
}

impl TryFrom<&str> for TaskLogKind {
    type Error = crate::enums::UnknownVariant;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "status_change" => Ok(Self::StatusChange),
            "note" => Ok(Self::Note),
            other => Err(crate::enums::UnknownVariant {
                kind: "task log kind",
                value: other.to_owned(),
            }),
        }
    }
}

/// One immutable entry in a task's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogEntry {
    #[serde(default)]
    pub id: i64,
    pub task_id: i64,
    pub created_at: DateTime<Utc>,
    pub kind: TaskLogKind,
    pub message: String,
}

/// Builder for tasks, used by tests and the CLI create path.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: i32,
    epic_key: Option<String>,
    category: Option<Category>,
    source_doc_id: Option<i64>,
    parent_task_id: Option<i64>,
}

impl TaskBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::Open,
            priority: DEFAULT_PRIORITY,
            epic_key: None,
            category: None,
            source_doc_id: None,
            parent_task_id: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn epic_key(mut self, key: impl Into<String>) -> Self {
        self.epic_key = Some(key.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn source_doc_id(mut self, id: i64) -> Self {
        self.source_doc_id = Some(id);
        self
    }

    pub fn parent_task_id(mut self, id: i64) -> Self {
        self.parent_task_id = Some(id);
        self
    }

    pub fn build(self) -> Task {
        let now = Utc::now();
        Task {
            id: 0,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            epic_key: self.epic_key,
            epic_seq: None,
            category: self.category,
            source_doc_id: self.source_doc_id,
            parent_task_id: self.parent_task_id,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn transition_refuses_self_loop() {
        for status in TaskStatus::all() {
            assert!(!can_transition(*status, *status));
        }
    }

    #[test]
    fn transition_allows_all_distinct_pairs() {
        for from in TaskStatus::all() {
            for to in TaskStatus::all() {
                if from != to {
                    assert!(can_transition(*from, *to), "{from} -> {to} should be legal");
                }
            }
        }
    }

    #[test]
    fn builder_defaults() {
        let task = TaskBuilder::new("Write migration").build();
        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(task.priority, DEFAULT_PRIORITY);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn log_kind_round_trip() {
        assert_eq!(
            TaskLogKind::try_from("status_change").unwrap(),
            TaskLogKind::StatusChange
        );
        assert_eq!(TaskLogKind::try_from("note").unwrap(), TaskLogKind::Note);
        assert!(TaskLogKind::try_from("comment").is_err());
    }
}
