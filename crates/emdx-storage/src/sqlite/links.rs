//! Document link edges for [`SqliteStore`].

use rusqlite::{params, Connection, Row};

use emdx_core::document::Document;
use emdx_core::enums::LinkMethod;
use emdx_core::link::DocumentLink;

use crate::error::{Result, StorageError};
use crate::sqlite::documents::{
    format_datetime, parse_datetime, scan_document, DOC_COLUMNS,
};
use crate::sqlite::store::SqliteStore;

// ---------------------------------------------------------------------------
// Connection-level helpers
// ---------------------------------------------------------------------------

/// Inserts (or refreshes) a link edge. Scores are clamped to [0, 1].
pub(crate) fn insert_link_on_conn(
    conn: &Connection,
    source_id: i64,
    target_id: i64,
    similarity_score: f64,
    method: LinkMethod,
) -> Result<()> {
    if source_id == target_id {
        return Err(StorageError::invalid_input(
            "a document cannot link to itself",
        ));
    }
    let now_str = format_datetime(&chrono::Utc::now());
    conn.execute(
        "INSERT OR REPLACE INTO document_links
         (source_id, target_id, similarity_score, method, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            source_id,
            target_id,
            similarity_score.clamp(0.0, 1.0),
            method.as_str(),
            now_str
        ],
    )?;
    Ok(())
}

fn scan_link(row: &Row<'_>) -> rusqlite::Result<DocumentLink> {
    let method_str: String = row.get("method")?;
    Ok(DocumentLink {
        source_id: row.get("source_id")?,
        target_id: row.get("target_id")?,
        similarity_score: row.get("similarity_score")?,
        method: LinkMethod::try_from(method_str.as_str()).unwrap_or(LinkMethod::Manual),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
    })
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Records a similarity link between two documents.
    pub fn link_documents(
        &self,
        source_id: i64,
        target_id: i64,
        similarity_score: f64,
        method: LinkMethod,
    ) -> Result<()> {
        self.run_in_transaction(|conn| {
            crate::sqlite::tags::require_document(conn, source_id)?;
            crate::sqlite::tags::require_document(conn, target_id)?;
            insert_link_on_conn(conn, source_id, target_id, similarity_score, method)
        })
    }

    /// Returns outgoing links, best score first.
    pub fn get_links_from(&self, source_id: i64) -> Result<Vec<DocumentLink>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT source_id, target_id, similarity_score, method, created_at
             FROM document_links WHERE source_id = ?1
             ORDER BY similarity_score DESC",
        )?;
        let rows = stmt.query_map(params![source_id], scan_link)?;
        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }

    /// Returns live documents related to the given one, in either link
    /// direction, best score first.
    pub fn get_related_documents(&self, id: i64, limit: i64) -> Result<Vec<(Document, f64)>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {DOC_COLUMNS}, l.similarity_score AS score
             FROM documents
             INNER JOIN document_links l
                ON (l.target_id = documents.id AND l.source_id = ?1)
                OR (l.source_id = documents.id AND l.target_id = ?1)
             WHERE documents.deleted_at IS NULL
             ORDER BY l.similarity_score DESC
             LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id, limit], |row| {
            let doc = scan_document(row)?;
            let score: f64 = row.get("score")?;
            Ok((doc, score))
        })?;
        let mut related = Vec::new();
        for row in rows {
            related.push(row?);
        }
        Ok(related)
    }
}
