//! Filter types for document, task, and execution queries.

use chrono::{DateTime, Utc};

use crate::enums::{Category, ExecStatus, TaskStatus};

/// Default result limit for list and search operations.
pub const DEFAULT_LIMIT: i64 = 10;

/// Hard cap on any caller-supplied limit.
pub const MAX_LIMIT: i64 = 10_000;

/// Filter for document listings and every search mode.
///
/// The same struct flows through the wildcard, FTS, fuzzy, and semantic
/// paths so that no path can drift on filter semantics.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub project: Option<String>,

    /// AND semantics: document must carry ALL of these tags.
    pub tags_all: Vec<String>,
    /// OR semantics: document must carry AT LEAST ONE of these tags.
    pub tags_any: Vec<String>,

    // Date ranges
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,

    /// Include archived documents (default false).
    pub include_archived: bool,
    /// Include trashed documents (default false).
    pub include_deleted: bool,

    /// Restrict to children of a given document.
    pub parent_id: Option<i64>,

    pub limit: Option<i64>,
}

impl DocumentFilter {
    /// Effective limit: caller value clamped to [1, MAX_LIMIT], defaulting
    /// to [`DEFAULT_LIMIT`].
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Filter for task listings.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub epic_key: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<i32>,
    pub source_doc_id: Option<i64>,
    pub limit: Option<i64>,
}

/// Filter for execution listings.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub status: Option<ExecStatus>,
    /// Only executions started after this instant.
    pub started_after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn document_filter_defaults() {
        let f = DocumentFilter::default();
        assert!(!f.include_archived);
        assert!(!f.include_deleted);
        assert_eq!(f.effective_limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn limit_is_clamped() {
        let f = DocumentFilter {
            limit: Some(1_000_000),
            ..Default::default()
        };
        assert_eq!(f.effective_limit(), MAX_LIMIT);

        let f = DocumentFilter {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(f.effective_limit(), 1);
    }
}
