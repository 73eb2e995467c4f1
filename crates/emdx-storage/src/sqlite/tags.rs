//! Tag CRUD and join-table maintenance for [`SqliteStore`].
//!
//! Tag names are case-preserved but compared lowercase (the `tags.name`
//! column is `COLLATE NOCASE`). `usage_count` is denormalized and kept in
//! step with the join table inside the same transaction as every edit.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use emdx_core::tag::Tag;

use crate::error::{Result, StorageError};
use crate::sqlite::documents::parse_datetime;
use crate::sqlite::store::SqliteStore;

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with the save transaction)
// ---------------------------------------------------------------------------

/// Finds or creates a tag row, returning its id.
pub(crate) fn get_or_create_tag_on_conn(conn: &Connection, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StorageError::invalid_input("tag name must not be empty"));
    }

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM tags WHERE name = ?1 COLLATE NOCASE",
            params![name],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute("INSERT INTO tags (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

/// Links a tag to a document, bumping usage_count when the link is new.
pub(crate) fn link_tag_on_conn(conn: &Connection, document_id: i64, tag_id: i64) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO document_tags (document_id, tag_id) VALUES (?1, ?2)",
        params![document_id, tag_id],
    )?;
    if inserted > 0 {
        conn.execute(
            "UPDATE tags SET usage_count = usage_count + 1 WHERE id = ?1",
            params![tag_id],
        )?;
    }
    Ok(inserted > 0)
}

/// Unlinks a tag from a document, dropping usage_count when a link existed.
pub(crate) fn unlink_tag_on_conn(conn: &Connection, document_id: i64, tag_id: i64) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM document_tags WHERE document_id = ?1 AND tag_id = ?2",
        params![document_id, tag_id],
    )?;
    if removed > 0 {
        conn.execute(
            "UPDATE tags SET usage_count = MAX(usage_count - 1, 0) WHERE id = ?1",
            params![tag_id],
        )?;
    }
    Ok(removed > 0)
}

/// Adds a set of tags to a document; duplicates within the call collapse.
pub(crate) fn add_tags_on_conn(
    conn: &Connection,
    document_id: i64,
    names: &[String],
) -> Result<()> {
    let mut seen: HashSet<String> = HashSet::new();
    for name in names {
        if !seen.insert(Tag::normalize(name)) {
            continue;
        }
        let tag_id = get_or_create_tag_on_conn(conn, name)?;
        link_tag_on_conn(conn, document_id, tag_id)?;
    }
    Ok(())
}

/// Returns tag names linked to a document, sorted.
pub(crate) fn get_document_tags_on_conn(
    conn: &Connection,
    document_id: i64,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name FROM tags t
         INNER JOIN document_tags dt ON dt.tag_id = t.id
         WHERE dt.document_id = ?1
         ORDER BY t.name",
    )?;
    let rows = stmt.query_map(params![document_id], |row| row.get::<_, String>(0))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

fn scan_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        name: row.get("name")?,
        usage_count: row.get("usage_count")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
    })
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Adds tags to a document atomically.
    pub fn add_tags(&self, document_id: i64, names: &[String]) -> Result<()> {
        self.run_in_transaction(|conn| {
            require_document(conn, document_id)?;
            add_tags_on_conn(conn, document_id, names)
        })
    }

    /// Removes tags from a document atomically. Unknown names are ignored.
    pub fn remove_tags(&self, document_id: i64, names: &[String]) -> Result<()> {
        self.run_in_transaction(|conn| {
            require_document(conn, document_id)?;
            for name in names {
                let tag_id: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM tags WHERE name = ?1 COLLATE NOCASE",
                        params![name.trim()],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(tag_id) = tag_id {
                    unlink_tag_on_conn(conn, document_id, tag_id)?;
                }
            }
            Ok(())
        })
    }

    /// Lists all tags ordered by usage.
    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, usage_count, created_at FROM tags
             ORDER BY usage_count DESC, name",
        )?;
        let rows = stmt.query_map([], scan_tag)?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    /// Looks up a single tag by name.
    pub fn get_tag(&self, name: &str) -> Result<Tag> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, name, usage_count, created_at FROM tags WHERE name = ?1 COLLATE NOCASE",
            params![name.trim()],
            scan_tag,
        )
        .optional()?
        .ok_or_else(|| StorageError::not_found("tag", name))
    }

    /// Renames a tag, merging into the target when it already exists.
    ///
    /// Every document that carried `old` carries `new` afterwards; the old
    /// tag row is removed and usage counts stay consistent with the join
    /// table.
    pub fn rename_tag(&self, old: &str, new: &str) -> Result<()> {
        let new = new.trim();
        if new.is_empty() {
            return Err(StorageError::invalid_input("tag name must not be empty"));
        }
        self.run_in_transaction(|conn| {
            let old_id: i64 = conn
                .query_row(
                    "SELECT id FROM tags WHERE name = ?1 COLLATE NOCASE",
                    params![old.trim()],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StorageError::not_found("tag", old))?;

            let target_id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM tags WHERE name = ?1 COLLATE NOCASE AND id != ?2",
                    params![new, old_id],
                    |row| row.get(0),
                )
                .optional()?;

            match target_id {
                // Plain rename: no existing target to merge into.
                None => {
                    conn.execute(
                        "UPDATE tags SET name = ?1 WHERE id = ?2",
                        params![new, old_id],
                    )?;
                }
                Some(target_id) => {
                    merge_tag_rows(conn, old_id, target_id)?;
                }
            }
            debug!(old, new, "renamed tag");
            Ok(())
        })
    }

    /// Merges tag `from` into tag `into`, removing `from`.
    pub fn merge_tags(&self, from: &str, into: &str) -> Result<()> {
        self.run_in_transaction(|conn| {
            let from_id: i64 = conn
                .query_row(
                    "SELECT id FROM tags WHERE name = ?1 COLLATE NOCASE",
                    params![from.trim()],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StorageError::not_found("tag", from))?;
            let into_id: i64 = conn
                .query_row(
                    "SELECT id FROM tags WHERE name = ?1 COLLATE NOCASE",
                    params![into.trim()],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StorageError::not_found("tag", into))?;
            if from_id == into_id {
                return Err(StorageError::conflict("cannot merge a tag into itself"));
            }
            merge_tag_rows(conn, from_id, into_id)
        })
    }
}

/// Moves every link from tag `from_id` onto `into_id`, then deletes `from_id`.
fn merge_tag_rows(conn: &Connection, from_id: i64, into_id: i64) -> Result<()> {
    // Re-point links that will not collide; collisions just drop.
    conn.execute(
        "UPDATE OR IGNORE document_tags SET tag_id = ?1 WHERE tag_id = ?2",
        params![into_id, from_id],
    )?;
    conn.execute(
        "DELETE FROM document_tags WHERE tag_id = ?1",
        params![from_id],
    )?;
    conn.execute("DELETE FROM tags WHERE id = ?1", params![from_id])?;
    // Recompute the target's count from the join table after the merge.
    conn.execute(
        "UPDATE tags SET usage_count =
             (SELECT COUNT(*) FROM document_tags WHERE tag_id = tags.id)
         WHERE id = ?1",
        params![into_id],
    )?;
    Ok(())
}

/// Fails with NotFound unless the document exists and is not purged.
pub(crate) fn require_document(conn: &Connection, document_id: i64) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1)",
        params![document_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(StorageError::not_found("document", document_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::sqlite::documents::SaveOptions;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn save_doc(store: &SqliteStore, title: &str, tags: &[&str]) -> i64 {
        let opts = SaveOptions {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        };
        store
            .save_document(title, "content long enough for policy", &opts)
            .unwrap()
    }

    #[test]
    fn save_creates_tags_with_counts() {
        let store = test_store();
        save_doc(&store, "First", &["a", "b"]);
        save_doc(&store, "Second", &["a", "b"]);

        let a = store.get_tag("a").unwrap();
        let b = store.get_tag("b").unwrap();
        assert_eq!(a.usage_count, 2);
        assert_eq!(b.usage_count, 2);
    }

    #[test]
    fn add_tags_is_idempotent() {
        let store = test_store();
        let id = save_doc(&store, "Doc", &[]);

        store
            .add_tags(id, &["x".into(), "x".into(), "y".into()])
            .unwrap();
        store.add_tags(id, &["x".into()]).unwrap();

        let x = store.get_tag("x").unwrap();
        assert_eq!(x.usage_count, 1);
        let doc = store.get_document(id).unwrap();
        assert_eq!(doc.tags, vec!["x", "y"]);
    }

    #[test]
    fn remove_tags_restores_counts() {
        let store = test_store();
        let id = save_doc(&store, "Doc", &["a"]);
        let before = store.get_tag("a").unwrap().usage_count;

        store.add_tags(id, &["a".into()]).unwrap();
        store.remove_tags(id, &["a".into()]).unwrap();

        let after = store.get_tag("a").unwrap().usage_count;
        assert_eq!(after, before - 1);
    }

    #[test]
    fn tags_compare_case_insensitive() {
        let store = test_store();
        let id = save_doc(&store, "Doc", &["GamePlan"]);
        store.add_tags(id, &["gameplan".into()]).unwrap();

        let tag = store.get_tag("GAMEPLAN").unwrap();
        // Original casing preserved, single row, single link.
        assert_eq!(tag.name, "GamePlan");
        assert_eq!(tag.usage_count, 1);
    }

    #[test]
    fn rename_tag_plain() {
        let store = test_store();
        let id = save_doc(&store, "Doc", &["a"]);

        store.rename_tag("a", "alpha").unwrap();
        assert!(store.get_tag("a").unwrap_err().is_not_found());
        let alpha = store.get_tag("alpha").unwrap();
        assert_eq!(alpha.usage_count, 1);
        let doc = store.get_document(id).unwrap();
        assert_eq!(doc.tags, vec!["alpha"]);
    }

    #[test]
    fn rename_tag_merges_into_existing() {
        let store = test_store();
        let d1 = save_doc(&store, "One", &["a"]);
        let d2 = save_doc(&store, "Two", &["alpha"]);
        let d3 = save_doc(&store, "Both", &["a", "alpha"]);

        store.rename_tag("a", "alpha").unwrap();

        assert!(store.get_tag("a").unwrap_err().is_not_found());
        let alpha = store.get_tag("alpha").unwrap();
        assert_eq!(alpha.usage_count, 3);
        for id in [d1, d2, d3] {
            assert_eq!(store.get_document(id).unwrap().tags, vec!["alpha"]);
        }
    }

    #[test]
    fn merge_into_self_is_conflict() {
        let store = test_store();
        save_doc(&store, "Doc", &["solo"]);
        let err = store.merge_tags("solo", "SOLO").unwrap_err();
        assert!(matches!(err, StorageError::ConflictState { .. }));
    }
}
