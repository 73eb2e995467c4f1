//! Document struct -- the primary unit of knowledge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exclusive lifecycle state of a document, derived from its timestamps.
///
/// `deleted_at` wins over `archived_at`: a trashed document is trashed even
/// if it was archived first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Live,
    Archived,
    Trashed,
}

/// A stored knowledge document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: i64,

    pub title: String,

    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub access_count: u64,

    /// Optional self-reference to a parent document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Tag names, populated from the join table on read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Document {
    /// Derives the exclusive lifecycle status.
    pub fn status(&self) -> DocumentStatus {
        if self.deleted_at.is_some() {
            DocumentStatus::Trashed
        } else if self.archived_at.is_some() {
            DocumentStatus::Archived
        } else {
            DocumentStatus::Live
        }
    }

    /// Returns `true` if the document is neither trashed nor archived.
    pub fn is_live(&self) -> bool {
        self.status() == DocumentStatus::Live
    }

    /// Returns `true` if the document is in the trash.
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Builder for documents, used by tests and import paths.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    title: String,
    content: String,
    project: Option<String>,
    parent_id: Option<i64>,
    tags: Vec<String>,
}

impl DocumentBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: String::new(),
            project: None,
            parent_id: None,
            tags: Vec::new(),
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn parent_id(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn build(self) -> Document {
        let now = Utc::now();
        Document {
            id: 0,
            title: self.title,
            content: self.content,
            project: self.project,
            created_at: now,
            updated_at: now,
            accessed_at: None,
            access_count: 0,
            parent_id: self.parent_id,
            archived_at: None,
            deleted_at: None,
            tags: self.tags,
        }
    }
}
