//! Document CRUD and lifecycle operations for [`SqliteStore`].
//!
//! The FTS mirror is kept in sync inside the same transaction as every
//! write: a `document_fts` row exists exactly when `deleted_at IS NULL`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use emdx_core::document::Document;
use emdx_core::enums::{LinkMethod, SourceKind};
use emdx_core::filter::DocumentFilter;
use emdx_core::validation::{validate_content, validate_title};

use crate::error::{Result, StorageError};
use crate::sqlite::filter_sql::document_filter_sql;
use crate::sqlite::links::insert_link_on_conn;
use crate::sqlite::sources::record_source_on_conn;
use crate::sqlite::store::SqliteStore;
use crate::sqlite::tags::{add_tags_on_conn, get_document_tags_on_conn};

// ---------------------------------------------------------------------------
// Column list (shared between INSERT and SELECT)
// ---------------------------------------------------------------------------

/// All document columns in a deterministic order for SELECT queries.
pub(crate) const DOC_COLUMNS: &str = r#"
    documents.id, documents.title, documents.content, documents.project,
    documents.created_at, documents.updated_at, documents.accessed_at,
    documents.access_count, documents.parent_id,
    documents.archived_at, documents.deleted_at
"#;

// ---------------------------------------------------------------------------
// Datetime helpers
// ---------------------------------------------------------------------------

/// Formats a `DateTime<Utc>` as ISO 8601 TEXT for SQLite.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parses an ISO 8601 TEXT string from SQLite into a `DateTime<Utc>`.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|_| {
        chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ"))
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .map(|ndt| ndt.and_utc())
            .unwrap_or_else(|_| Utc::now())
    })
}

// ---------------------------------------------------------------------------
// Row scanning
// ---------------------------------------------------------------------------

/// Deserialises a row into a [`Document`]. Column order MUST match
/// [`DOC_COLUMNS`]. Tags are populated separately from the join table.
pub(crate) fn scan_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let created_at_str: String = row.get("created_at")?;
    let updated_at_str: String = row.get("updated_at")?;
    let accessed_at_str: Option<String> = row.get("accessed_at")?;
    let archived_at_str: Option<String> = row.get("archived_at")?;
    let deleted_at_str: Option<String> = row.get("deleted_at")?;

    Ok(Document {
        id: row.get("id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        project: row.get("project")?,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
        accessed_at: accessed_at_str.as_deref().map(parse_datetime),
        access_count: row.get::<_, i64>("access_count")? as u64,
        parent_id: row.get("parent_id")?,
        archived_at: archived_at_str.as_deref().map(parse_datetime),
        deleted_at: deleted_at_str.as_deref().map(parse_datetime),
        tags: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// FTS mirror discipline
// ---------------------------------------------------------------------------

/// Inserts the FTS row for a live document.
pub(crate) fn fts_insert_on_conn(
    conn: &Connection,
    id: i64,
    title: &str,
    content: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO document_fts (rowid, title, content) VALUES (?1, ?2, ?3)",
        params![id, title, content],
    )?;
    Ok(())
}

/// Removes the FTS row for a document.
pub(crate) fn fts_delete_on_conn(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM document_fts WHERE rowid = ?1", params![id])?;
    Ok(())
}

/// Re-syncs the FTS row after a content or title change.
fn fts_update_on_conn(conn: &Connection, id: i64, title: &str, content: &str) -> Result<()> {
    fts_delete_on_conn(conn, id)?;
    fts_insert_on_conn(conn, id, title, content)
}

// ---------------------------------------------------------------------------
// Save options and partial updates
// ---------------------------------------------------------------------------

/// Options for [`SqliteStore::save_document`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub project: Option<String>,
    /// Canonical tag names (alias resolution happens at the boundary).
    pub tags: Vec<String>,
    pub parent_id: Option<i64>,
    /// Archive the newest live same-titled document and link to it.
    pub supersede: bool,
    /// Provenance for non-user saves, recorded in the same transaction.
    pub source: Option<(SourceKind, String)>,
}

/// Typed partial-update struct for documents.
///
/// Only `Some` fields are applied. `project` uses a nested `Option` so a
/// caller can clear it.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdates {
    pub title: Option<String>,
    pub content: Option<String>,
    pub project: Option<Option<String>>,
}

// ---------------------------------------------------------------------------
// Connection-level helpers
// ---------------------------------------------------------------------------

/// Fetches a document by id, optionally including trashed rows.
pub(crate) fn get_document_on_conn(
    conn: &Connection,
    id: i64,
    include_deleted: bool,
) -> Result<Document> {
    let deleted_clause = if include_deleted {
        ""
    } else {
        " AND documents.deleted_at IS NULL"
    };
    let sql =
        format!("SELECT {DOC_COLUMNS} FROM documents WHERE documents.id = ?1{deleted_clause}");
    let mut doc = conn
        .query_row(&sql, params![id], scan_document)
        .optional()?
        .ok_or_else(|| StorageError::not_found("document", id))?;
    doc.tags = get_document_tags_on_conn(conn, id)?;
    Ok(doc)
}

/// Inserts a document plus FTS row, tags, provenance, and supersede link.
pub(crate) fn save_document_on_conn(
    conn: &Connection,
    title: &str,
    content: &str,
    opts: &SaveOptions,
) -> Result<i64> {
    let title = validate_title(title)?;
    validate_content(content)?;

    if let Some(parent_id) = opts.parent_id {
        // A trashed parent would orphan the child on purge.
        get_document_on_conn(conn, parent_id, false)
            .map_err(|_| StorageError::invalid_input(format!("parent {parent_id} is not live")))?;
    }

    // Supersede: the newest live document with the same normalized title.
    let superseded: Option<i64> = if opts.supersede {
        conn.query_row(
            "SELECT id FROM documents
             WHERE lower(title) = lower(?1) AND deleted_at IS NULL AND archived_at IS NULL
             ORDER BY created_at DESC LIMIT 1",
            params![title],
            |row| row.get(0),
        )
        .optional()?
    } else {
        None
    };

    let now_str = format_datetime(&Utc::now());
    conn.execute(
        "INSERT INTO documents (title, content, project, parent_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![title, content, opts.project, opts.parent_id, now_str],
    )?;
    let id = conn.last_insert_rowid();

    fts_insert_on_conn(conn, id, &title, content)?;
    add_tags_on_conn(conn, id, &opts.tags)?;

    if let Some(old_id) = superseded {
        conn.execute(
            "UPDATE documents SET archived_at = ?1 WHERE id = ?2",
            params![now_str, old_id],
        )?;
        insert_link_on_conn(conn, id, old_id, 1.0, LinkMethod::Manual)?;
        debug!(new = id, old = old_id, "superseded document");
    }

    if let Some((kind, ref source_id)) = opts.source {
        record_source_on_conn(conn, id, kind, source_id)?;
    }

    Ok(id)
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Saves a new document. Everything -- row, FTS mirror, tag links,
    /// provenance, supersede archive -- commits in one transaction.
    pub fn save_document(&self, title: &str, content: &str, opts: &SaveOptions) -> Result<i64> {
        self.run_in_transaction(|conn| save_document_on_conn(conn, title, content, opts))
    }

    /// Fetches a document by id without touching access tracking.
    ///
    /// Trashed documents are not found; archived ones are.
    pub fn get_document(&self, id: i64) -> Result<Document> {
        let conn = self.lock_conn()?;
        get_document_on_conn(&conn, id, false)
    }

    /// Fetches a document including trashed rows (restore/purge paths).
    pub fn get_document_any(&self, id: i64) -> Result<Document> {
        let conn = self.lock_conn()?;
        get_document_on_conn(&conn, id, true)
    }

    /// Resolves a numeric id or an exact title to a document id.
    ///
    /// Titles match case-insensitively against live documents, newest first.
    pub fn resolve_document_ref(&self, id_or_title: &str) -> Result<i64> {
        if let Ok(id) = id_or_title.parse::<i64>() {
            // Verify it refers to a live row.
            self.get_document(id)?;
            return Ok(id);
        }
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id FROM documents
             WHERE lower(title) = lower(?1) AND deleted_at IS NULL
             ORDER BY created_at DESC LIMIT 1",
            params![id_or_title],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StorageError::not_found("document", id_or_title))
    }

    /// Fetches a document for a user-facing view, bumping access tracking
    /// in a single UPDATE.
    pub fn get_and_touch_document(&self, id: i64) -> Result<Document> {
        let conn = self.lock_conn()?;
        let now_str = format_datetime(&Utc::now());
        let affected = conn.execute(
            "UPDATE documents
             SET access_count = access_count + 1, accessed_at = ?1
             WHERE id = ?2 AND deleted_at IS NULL",
            params![now_str, id],
        )?;
        if affected == 0 {
            return Err(StorageError::not_found("document", id));
        }
        get_document_on_conn(&conn, id, false)
    }

    /// Applies partial updates, refreshing `updated_at` and the FTS mirror.
    pub fn update_document(&self, id: i64, updates: &DocumentUpdates) -> Result<()> {
        self.run_in_transaction(|conn| {
            let current = get_document_on_conn(conn, id, false)?;

            let title = match updates.title {
                Some(ref t) => validate_title(t)?,
                None => current.title.clone(),
            };
            let content = match updates.content {
                Some(ref c) => {
                    validate_content(c)?;
                    c.clone()
                }
                None => current.content.clone(),
            };
            let project = match updates.project {
                Some(ref p) => p.clone(),
                None => current.project.clone(),
            };

            let now_str = format_datetime(&Utc::now());
            conn.execute(
                "UPDATE documents SET title = ?1, content = ?2, project = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![title, content, project, now_str, id],
            )?;
            fts_update_on_conn(conn, id, &title, &content)
        })
    }

    /// Moves a document to the trash; the FTS row goes with it.
    ///
    /// A parent with live children cannot be trashed; trash or re-parent
    /// the children first.
    pub fn soft_delete_document(&self, id: i64) -> Result<()> {
        self.run_in_transaction(|conn| {
            let doc = get_document_on_conn(conn, id, true)?;
            if doc.is_trashed() {
                return Err(StorageError::conflict(format!(
                    "document {id} is already in the trash"
                )));
            }
            let live_children: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents
                 WHERE parent_id = ?1 AND deleted_at IS NULL)",
                params![id],
                |row| row.get(0),
            )?;
            if live_children {
                return Err(StorageError::conflict(format!(
                    "document {id} has live children"
                )));
            }
            let now_str = format_datetime(&Utc::now());
            conn.execute(
                "UPDATE documents SET deleted_at = ?1 WHERE id = ?2",
                params![now_str, id],
            )?;
            fts_delete_on_conn(conn, id)
        })
    }

    /// Restores a trashed document; content becomes searchable again.
    pub fn restore_document(&self, id: i64) -> Result<()> {
        self.run_in_transaction(|conn| {
            let doc = get_document_on_conn(conn, id, true)?;
            if !doc.is_trashed() {
                return Err(StorageError::conflict(format!(
                    "document {id} is not in the trash"
                )));
            }
            conn.execute(
                "UPDATE documents SET deleted_at = NULL WHERE id = ?1",
                params![id],
            )?;
            fts_insert_on_conn(conn, id, &doc.title, &doc.content)
        })
    }

    /// Permanently removes a trashed document and its dependent rows.
    pub fn purge_document(&self, id: i64) -> Result<()> {
        self.run_in_transaction(|conn| {
            let doc = get_document_on_conn(conn, id, true)?;
            if !doc.is_trashed() {
                return Err(StorageError::conflict(format!(
                    "document {id} is live; delete it before purging"
                )));
            }
            // Keep denormalized tag counts in step before the cascade fires.
            conn.execute(
                "UPDATE tags SET usage_count = MAX(usage_count - 1, 0)
                 WHERE id IN (SELECT tag_id FROM document_tags WHERE document_id = ?1)",
                params![id],
            )?;
            // Detach non-cascading referrers: children, tasks, executions.
            conn.execute(
                "UPDATE documents SET parent_id = NULL WHERE parent_id = ?1",
                params![id],
            )?;
            conn.execute(
                "UPDATE tasks SET source_doc_id = NULL WHERE source_doc_id = ?1",
                params![id],
            )?;
            conn.execute(
                "UPDATE executions SET doc_id_output = NULL WHERE doc_id_output = ?1",
                params![id],
            )?;
            conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
            // FTS row was already removed on soft delete; nothing to do there.
            Ok(())
        })
    }

    /// Archives a document (live but hidden from default listings).
    ///
    /// Already-archived documents are a no-op. With `cascade`, descendants
    /// are archived too.
    pub fn archive_document(&self, id: i64, cascade: bool) -> Result<()> {
        self.run_in_transaction(|conn| {
            let doc = get_document_on_conn(conn, id, true)?;
            if doc.is_trashed() {
                return Err(StorageError::conflict(format!(
                    "document {id} is in the trash; restore it before archiving"
                )));
            }
            if doc.archived_at.is_some() {
                return Ok(());
            }
            let now_str = format_datetime(&Utc::now());
            conn.execute(
                "UPDATE documents SET archived_at = ?1 WHERE id = ?2",
                params![now_str, id],
            )?;
            if cascade {
                conn.execute(
                    "WITH RECURSIVE descendants(id) AS (
                         SELECT id FROM documents WHERE parent_id = ?2
                         UNION ALL
                         SELECT d.id FROM documents d
                         INNER JOIN descendants ON d.parent_id = descendants.id
                     )
                     UPDATE documents SET archived_at = ?1
                     WHERE id IN (SELECT id FROM descendants)
                       AND archived_at IS NULL AND deleted_at IS NULL",
                    params![now_str, id],
                )?;
            }
            Ok(())
        })
    }

    /// Clears the archived flag. Not-archived documents are a no-op.
    pub fn unarchive_document(&self, id: i64) -> Result<()> {
        self.run_in_transaction(|conn| {
            get_document_on_conn(conn, id, false)?;
            conn.execute(
                "UPDATE documents SET archived_at = NULL WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
    }

    /// Lists documents matching the filter, newest first.
    pub fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let conn = self.lock_conn()?;
        let built = document_filter_sql(filter, 1);
        let sql = format!(
            "SELECT {DOC_COLUMNS} FROM documents{} ORDER BY documents.created_at DESC LIMIT {}",
            built.where_sql(),
            filter.effective_limit()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(built.param_refs().as_slice(), scan_document)?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        for doc in docs.iter_mut() {
            doc.tags = get_document_tags_on_conn(&conn, doc.id)?;
        }
        Ok(docs)
    }

    /// Counts documents matching the filter (ignores the limit).
    pub fn count_documents(&self, filter: &DocumentFilter) -> Result<u64> {
        let conn = self.lock_conn()?;
        let built = document_filter_sql(filter, 1);
        let sql = format!("SELECT COUNT(*) FROM documents{}", built.where_sql());
        let count: i64 =
            conn.query_row(&sql, built.param_refs().as_slice(), |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Returns the set of live document titles.
    pub fn get_all_titles(&self) -> Result<std::collections::BTreeSet<String>> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT title FROM documents WHERE deleted_at IS NULL")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut titles = std::collections::BTreeSet::new();
        for row in rows {
            titles.insert(row?);
        }
        Ok(titles)
    }

    /// Records provenance for a document produced by a non-user source.
    pub fn record_source(&self, document_id: i64, kind: SourceKind, source_id: &str) -> Result<()> {
        self.run_in_transaction(|conn| record_source_on_conn(conn, document_id, kind, source_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn fts_row_count(store: &SqliteStore, id: i64) -> i64 {
        let conn = store.lock_conn().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM document_fts WHERE rowid = ?1",
            params![id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn save_then_get_round_trip() {
        let store = test_store();
        let opts = SaveOptions {
            project: Some("emdx".into()),
            tags: vec!["gameplan".into()],
            ..Default::default()
        };
        let id = store
            .save_document("Async Patterns", "async programming guide...", &opts)
            .unwrap();

        let doc = store.get_document(id).unwrap();
        assert_eq!(doc.title, "Async Patterns");
        assert_eq!(doc.content, "async programming guide...");
        assert_eq!(doc.project.as_deref(), Some("emdx"));
        assert_eq!(doc.tags, vec!["gameplan"]);
        assert_eq!(fts_row_count(&store, id), 1);
    }

    #[test]
    fn save_rejects_empty_title() {
        let store = test_store();
        let err = store
            .save_document("   ", "content long enough", &SaveOptions::default())
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn save_rejects_short_content() {
        let store = test_store();
        let err = store
            .save_document("Title", "", &SaveOptions::default())
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn trash_lifecycle_round_trip() {
        let store = test_store();
        let id = store
            .save_document("Doc", "some content here", &SaveOptions::default())
            .unwrap();
        let original = store.get_document(id).unwrap();

        store.soft_delete_document(id).unwrap();
        assert!(store.get_document(id).unwrap_err().is_not_found());
        assert_eq!(fts_row_count(&store, id), 0);

        // Visible with include_deleted.
        let filter = DocumentFilter {
            include_deleted: true,
            ..Default::default()
        };
        assert!(store.list_documents(&filter).unwrap().iter().any(|d| d.id == id));

        store.restore_document(id).unwrap();
        let restored = store.get_document(id).unwrap();
        assert_eq!(restored.content, original.content);
        assert_eq!(fts_row_count(&store, id), 1);

        store.soft_delete_document(id).unwrap();
        store.purge_document(id).unwrap();
        assert!(store.get_document_any(id).unwrap_err().is_not_found());
    }

    #[test]
    fn parent_with_live_children_cannot_be_trashed() {
        let store = test_store();
        let parent = store
            .save_document("Parent", "parent content here", &SaveOptions::default())
            .unwrap();
        let child = store
            .save_document(
                "Child",
                "child content here",
                &SaveOptions {
                    parent_id: Some(parent),
                    ..Default::default()
                },
            )
            .unwrap();

        let err = store.soft_delete_document(parent).unwrap_err();
        assert!(matches!(err, StorageError::ConflictState { .. }));

        // Once the child is trashed too, the parent can go, and purging it
        // detaches the trashed child.
        store.soft_delete_document(child).unwrap();
        store.soft_delete_document(parent).unwrap();
        store.purge_document(parent).unwrap();

        store.restore_document(child).unwrap();
        let child = store.get_document(child).unwrap();
        assert!(child.parent_id.is_none());
    }

    #[test]
    fn purge_of_live_document_is_conflict() {
        let store = test_store();
        let id = store
            .save_document("Doc", "some content here", &SaveOptions::default())
            .unwrap();
        let err = store.purge_document(id).unwrap_err();
        assert!(matches!(err, StorageError::ConflictState { .. }));
    }

    #[test]
    fn restore_of_live_document_is_conflict() {
        let store = test_store();
        let id = store
            .save_document("Doc", "some content here", &SaveOptions::default())
            .unwrap();
        let err = store.restore_document(id).unwrap_err();
        assert!(matches!(err, StorageError::ConflictState { .. }));
    }

    #[test]
    fn archive_is_idempotent_and_preserves_updated_at() {
        let store = test_store();
        let id = store
            .save_document("Doc", "some content here", &SaveOptions::default())
            .unwrap();
        store.archive_document(id, false).unwrap();
        let first = store.get_document(id).unwrap();

        store.archive_document(id, false).unwrap();
        let second = store.get_document(id).unwrap();
        assert_eq!(first.archived_at, second.archived_at);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[test]
    fn archive_cascade_covers_descendants() {
        let store = test_store();
        let root = store
            .save_document("Root", "root content here", &SaveOptions::default())
            .unwrap();
        let child = store
            .save_document(
                "Child",
                "child content here",
                &SaveOptions {
                    parent_id: Some(root),
                    ..Default::default()
                },
            )
            .unwrap();
        let grandchild = store
            .save_document(
                "Grandchild",
                "grandchild content",
                &SaveOptions {
                    parent_id: Some(child),
                    ..Default::default()
                },
            )
            .unwrap();

        store.archive_document(root, true).unwrap();
        for id in [root, child, grandchild] {
            assert!(store.get_document(id).unwrap().archived_at.is_some());
        }
    }

    #[test]
    fn include_archived_toggle_changes_results() {
        let store = test_store();
        let live = store
            .save_document("Live", "live content here", &SaveOptions::default())
            .unwrap();
        let archived = store
            .save_document("Archived", "archived content", &SaveOptions::default())
            .unwrap();
        store.archive_document(archived, false).unwrap();

        let without = store.list_documents(&DocumentFilter::default()).unwrap();
        let with = store
            .list_documents(&DocumentFilter {
                include_archived: true,
                ..Default::default()
            })
            .unwrap();

        let without_ids: Vec<i64> = without.iter().map(|d| d.id).collect();
        let with_ids: Vec<i64> = with.iter().map(|d| d.id).collect();
        assert!(without_ids.contains(&live));
        assert!(!without_ids.contains(&archived));
        assert!(with_ids.contains(&archived));
        assert_ne!(without_ids, with_ids);
    }

    #[test]
    fn supersede_archives_and_links() {
        let store = test_store();
        let old = store
            .save_document("Design Notes", "first draft content", &SaveOptions::default())
            .unwrap();
        let new = store
            .save_document(
                "Design Notes",
                "second draft content",
                &SaveOptions {
                    supersede: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let old_doc = store.get_document(old).unwrap();
        assert!(old_doc.archived_at.is_some());

        let links = store.get_links_from(new).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_id, old);
        assert_eq!(links[0].method, LinkMethod::Manual);
        assert_eq!(links[0].similarity_score, 1.0);
    }

    #[test]
    fn non_user_save_records_source_in_same_transaction() {
        let store = test_store();
        let id = store
            .save_document(
                "Delegate Output",
                "captured result content",
                &SaveOptions {
                    source: Some((SourceKind::Execution, "1712-1-abc123".into())),
                    ..Default::default()
                },
            )
            .unwrap();

        let source = store.get_source(id).unwrap().unwrap();
        assert_eq!(source.kind, SourceKind::Execution);
        assert_eq!(source.source_id, "1712-1-abc123");
    }

    #[test]
    fn get_and_touch_increments_once() {
        let store = test_store();
        let id = store
            .save_document("Doc", "some content here", &SaveOptions::default())
            .unwrap();

        assert_eq!(store.get_document(id).unwrap().access_count, 0);
        let touched = store.get_and_touch_document(id).unwrap();
        assert_eq!(touched.access_count, 1);
        assert!(touched.accessed_at.is_some());
        // Non-counting read does not bump.
        assert_eq!(store.get_document(id).unwrap().access_count, 1);
    }

    #[test]
    fn update_resyncs_fts() {
        let store = test_store();
        let id = store
            .save_document("Doc", "original body text", &SaveOptions::default())
            .unwrap();
        store
            .update_document(
                id,
                &DocumentUpdates {
                    content: Some("rewritten body text".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let conn = store.lock_conn().unwrap();
        let content: String = conn
            .query_row(
                "SELECT content FROM document_fts WHERE rowid = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(content, "rewritten body text");
    }

    #[test]
    fn resolve_ref_by_title_and_id() {
        let store = test_store();
        let id = store
            .save_document("Unique Title", "some content here", &SaveOptions::default())
            .unwrap();

        assert_eq!(store.resolve_document_ref(&id.to_string()).unwrap(), id);
        assert_eq!(store.resolve_document_ref("unique title").unwrap(), id);
        assert!(store
            .resolve_document_ref("missing")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn date_filters_apply_on_list() {
        let store = test_store();
        store
            .save_document("Doc", "some content here", &SaveOptions::default())
            .unwrap();

        let future = DocumentFilter {
            created_after: Some(Utc::now() + chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(store.list_documents(&future).unwrap().is_empty());
        assert_eq!(store.count_documents(&future).unwrap(), 0);

        let past = DocumentFilter {
            created_after: Some(Utc::now() - chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert_eq!(store.list_documents(&past).unwrap().len(), 1);
    }

    #[test]
    fn all_titles_excludes_trash() {
        let store = test_store();
        let keep = store
            .save_document("Keep", "keep content here", &SaveOptions::default())
            .unwrap();
        let toss = store
            .save_document("Toss", "toss content here", &SaveOptions::default())
            .unwrap();
        store.soft_delete_document(toss).unwrap();
        let _ = keep;

        let titles = store.get_all_titles().unwrap();
        assert!(titles.contains("Keep"));
        assert!(!titles.contains("Toss"));
    }
}
