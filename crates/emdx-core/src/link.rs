//! Document link edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::LinkMethod;

/// A directed similarity edge between two documents.
///
/// Links are content-derived and recomputable; they are not authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLink {
    pub source_id: i64,
    pub target_id: i64,
    /// Similarity in [0, 1].
    pub similarity_score: f64,
    pub method: LinkMethod,
    pub created_at: DateTime<Utc>,
}

impl DocumentLink {
    /// Builds a link, clamping the score into [0, 1].
    pub fn new(source_id: i64, target_id: i64, similarity_score: f64, method: LinkMethod) -> Self {
        Self {
            source_id,
            target_id,
            similarity_score: similarity_score.clamp(0.0, 1.0),
            method,
            created_at: Utc::now(),
        }
    }
}
