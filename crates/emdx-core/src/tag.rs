//! Tag struct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A free-form label. Names are case-preserved but compared lowercase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    /// Denormalized count of linked documents.
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// Canonical comparison form of a tag name.
    pub fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }
}
