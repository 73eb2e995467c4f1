//! Enum types for the emdx system.
//!
//! Statuses are closed state machines: unknown strings are rejected at parse
//! time rather than carried as custom variants. `Category` is the one open
//! enum, since projects define their own short codes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// The enum kind (e.g., "task status").
    pub kind: &'static str,
    /// The offending input.
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Active,
    Blocked,
    Done,
    Failed,
    Wontdo,
}

impl TaskStatus {
    /// Returns the lowercase string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Wontdo => "wontdo",
        }
    }

    /// Returns `true` if no further work is expected on the task.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Wontdo)
    }

    /// Returns `true` if a dependency in this status no longer blocks its
    /// dependents.
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, Self::Done | Self::Wontdo)
    }

    /// All variants, in display order.
    pub fn all() -> &'static [TaskStatus] {
        &[
            Self::Open,
            Self::Active,
            Self::Blocked,
            Self::Done,
            Self::Failed,
            Self::Wontdo,
        ]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = UnknownVariant;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "open" => Ok(Self::Open),
            "active" => Ok(Self::Active),
            "blocked" => Ok(Self::Blocked),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            "wontdo" => Ok(Self::Wontdo),
            other => Err(UnknownVariant::new("task status", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Epic state
// ---------------------------------------------------------------------------

/// Aggregate state of an epic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpicState {
    Open,
    Active,
    Done,
}

impl EpicState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Active => "active",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for EpicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for EpicState {
    type Error = UnknownVariant;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "open" => Ok(Self::Open),
            "active" => Ok(Self::Active),
            "done" => Ok(Self::Done),
            other => Err(UnknownVariant::new("epic state", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution status
// ---------------------------------------------------------------------------

/// Lifecycle status of a delegate execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Killed,
}

impl ExecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Killed => "killed",
        }
    }

    /// Returns `true` once the execution can no longer change state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ExecStatus {
    type Error = UnknownVariant;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "timeout" => Ok(Self::Timeout),
            "killed" => Ok(Self::Killed),
            other => Err(UnknownVariant::new("execution status", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Link method
// ---------------------------------------------------------------------------

/// How a document link edge was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMethod {
    Keyword,
    Semantic,
    Manual,
}

impl LinkMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for LinkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for LinkMethod {
    type Error = UnknownVariant;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            "manual" => Ok(Self::Manual),
            other => Err(UnknownVariant::new("link method", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Source kind
// ---------------------------------------------------------------------------

/// Provenance of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    User,
    Execution,
    Skill,
    Recipe,
    Import,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Execution => "execution",
            Self::Skill => "skill",
            Self::Recipe => "recipe",
            Self::Import => "import",
        }
    }

    /// Returns `true` for documents that belong to a workflow rather than a
    /// user's top-level listing.
    pub fn is_workflow(&self) -> bool {
        !matches!(self, Self::User)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SourceKind {
    type Error = UnknownVariant;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "user" => Ok(Self::User),
            "execution" => Ok(Self::Execution),
            "skill" => Ok(Self::Skill),
            "recipe" => Ok(Self::Recipe),
            "import" => Ok(Self::Import),
            other => Err(UnknownVariant::new("source kind", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Short work-category code for tasks and epics.
///
/// The built-in set matches the common codes; anything else is preserved
/// verbatim as a custom code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Feat,
    Fix,
    Arch,
    Docs,
    Test,
    Chore,
    Custom(String),
}

impl Category {
    /// Returns the uppercase code stored in the database.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Feat => "FEAT",
            Self::Fix => "FIX",
            Self::Arch => "ARCH",
            Self::Docs => "DOCS",
            Self::Test => "TEST",
            Self::Chore => "CHORE",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Returns `true` for the built-in codes.
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "FEAT" => Self::Feat,
            "FIX" => Self::Fix,
            "ARCH" => Self::Arch,
            "DOCS" => Self::Docs,
            "TEST" => Self::Test,
            "CHORE" => Self::Chore,
            _ => Self::Custom(s.to_ascii_uppercase()),
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn task_status_round_trip() {
        for status in TaskStatus::all() {
            assert_eq!(TaskStatus::try_from(status.as_str()).unwrap(), *status);
        }
    }

    #[test]
    fn task_status_rejects_unknown() {
        let err = TaskStatus::try_from("cancelled").unwrap_err();
        assert_eq!(err.value, "cancelled");
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Wontdo.is_terminal());
        assert!(!TaskStatus::Open.is_terminal());
        assert!(!TaskStatus::Blocked.is_terminal());
    }

    #[test]
    fn dependency_satisfaction() {
        assert!(TaskStatus::Done.satisfies_dependency());
        assert!(TaskStatus::Wontdo.satisfies_dependency());
        assert!(!TaskStatus::Failed.satisfies_dependency());
    }

    #[test]
    fn exec_status_terminal() {
        assert!(!ExecStatus::Pending.is_terminal());
        assert!(!ExecStatus::Running.is_terminal());
        assert!(ExecStatus::Timeout.is_terminal());
        assert!(ExecStatus::Killed.is_terminal());
    }

    #[test]
    fn category_normalizes_case() {
        assert_eq!(Category::from("feat"), Category::Feat);
        assert_eq!(Category::from("PERF").as_str(), "PERF");
        assert!(!Category::from("PERF").is_builtin());
    }

    #[test]
    fn source_kind_workflow() {
        assert!(!SourceKind::User.is_workflow());
        assert!(SourceKind::Execution.is_workflow());
        assert!(SourceKind::Recipe.is_workflow());
    }
}
