//! Document provenance records.

use serde::{Deserialize, Serialize};

use crate::enums::SourceKind;

/// Links a document to what produced it.
///
/// Recording provenance for every non-user save is what keeps a delegate's
/// output from being listed both as a workflow child and as a top-level
/// document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSource {
    pub document_id: i64,
    pub kind: SourceKind,
    /// Identifier within the kind: execution id, skill name, recipe name,
    /// or import path.
    pub source_id: String,
}

impl DocumentSource {
    pub fn new(document_id: i64, kind: SourceKind, source_id: impl Into<String>) -> Self {
        Self {
            document_id,
            kind,
            source_id: source_id.into(),
        }
    }
}
