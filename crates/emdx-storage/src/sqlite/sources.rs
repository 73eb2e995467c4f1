//! Document provenance rows for [`SqliteStore`].

use rusqlite::{params, Connection, OptionalExtension};

use emdx_core::enums::SourceKind;
use emdx_core::source::DocumentSource;

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

/// Records (or replaces) the provenance of a document.
pub(crate) fn record_source_on_conn(
    conn: &Connection,
    document_id: i64,
    kind: SourceKind,
    source_id: &str,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO document_sources (document_id, source_kind, source_id)
         VALUES (?1, ?2, ?3)",
        params![document_id, kind.as_str(), source_id],
    )?;
    Ok(())
}

impl SqliteStore {
    /// Returns a document's provenance, if any was recorded.
    pub fn get_source(&self, document_id: i64) -> Result<Option<DocumentSource>> {
        let conn = self.lock_conn()?;
        let source = conn
            .query_row(
                "SELECT document_id, source_kind, source_id
                 FROM document_sources WHERE document_id = ?1",
                params![document_id],
                |row| {
                    let kind_str: String = row.get("source_kind")?;
                    Ok((
                        row.get::<_, i64>("document_id")?,
                        kind_str,
                        row.get::<_, String>("source_id")?,
                    ))
                },
            )
            .optional()?;

        match source {
            None => Ok(None),
            Some((document_id, kind_str, source_id)) => Ok(Some(DocumentSource {
                document_id,
                kind: SourceKind::try_from(kind_str.as_str())?,
                source_id,
            })),
        }
    }

    /// Ids of documents that belong to a workflow (non-user provenance).
    ///
    /// Listings that show top-level documents subtract these so a delegate's
    /// output is not double-listed.
    pub fn workflow_document_ids(&self) -> Result<Vec<i64>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT document_id FROM document_sources WHERE source_kind != 'user'",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::documents::SaveOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_and_get_source() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .save_document("Doc", "content long enough", &SaveOptions::default())
            .unwrap();

        assert!(store.get_source(id).unwrap().is_none());
        store
            .record_source(id, SourceKind::Skill, "summarize-repo")
            .unwrap();

        let source = store.get_source(id).unwrap().unwrap();
        assert_eq!(source.kind, SourceKind::Skill);
        assert_eq!(source.source_id, "summarize-repo");
        assert_eq!(store.workflow_document_ids().unwrap(), vec![id]);
    }
}
