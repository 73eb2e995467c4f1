//! Epic CRUD and the derived-state refresh for [`SqliteStore`].

use rusqlite::{params, Connection, OptionalExtension, Row};

use emdx_core::enums::{Category, EpicState, TaskStatus};
use emdx_core::epic::{derive_state, Epic};
use emdx_core::validation::{validate_epic_key, validate_title};

use crate::error::{Result, StorageError};
use crate::sqlite::documents::parse_datetime;
use crate::sqlite::store::SqliteStore;

fn scan_epic(row: &Row<'_>) -> rusqlite::Result<Epic> {
    let category_str: String = row.get("category")?;
    let status_str: String = row.get("status")?;
    Ok(Epic {
        key: row.get("key")?,
        title: row.get("title")?,
        category: Category::from(category_str.as_str()),
        state: EpicState::try_from(status_str.as_str()).unwrap_or(EpicState::Open),
        state_manual: row.get::<_, i64>("status_manual")? != 0,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
    })
}

fn get_epic_on_conn(conn: &Connection, key: &str) -> Result<Epic> {
    conn.query_row(
        "SELECT key, title, category, status, status_manual, created_at
         FROM epics WHERE key = ?1",
        params![key],
        scan_epic,
    )
    .optional()?
    .ok_or_else(|| StorageError::not_found("epic", key))
}

/// Recomputes a non-overridden epic's state from its child tasks.
pub(crate) fn refresh_epic_state_on_conn(conn: &Connection, key: &str) -> Result<EpicState> {
    let epic = get_epic_on_conn(conn, key)?;
    if epic.state_manual {
        return Ok(epic.state);
    }

    let mut stmt = conn.prepare_cached("SELECT status FROM tasks WHERE epic_key = ?1")?;
    let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
    let mut statuses = Vec::new();
    for row in rows {
        let status_str = row?;
        statuses.push(TaskStatus::try_from(status_str.as_str()).unwrap_or(TaskStatus::Open));
    }

    let state = derive_state(&statuses);
    conn.execute(
        "UPDATE epics SET status = ?1 WHERE key = ?2",
        params![state.as_str(), key],
    )?;
    Ok(state)
}

impl SqliteStore {
    /// Creates an epic.
    pub fn create_epic(&self, key: &str, title: &str, category: Category) -> Result<()> {
        let key = validate_epic_key(key)?;
        let title = validate_title(title)?;
        self.run_in_transaction(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM epics WHERE key = ?1)",
                params![key],
                |row| row.get(0),
            )?;
            if exists {
                return Err(StorageError::conflict(format!("epic {key} already exists")));
            }
            conn.execute(
                "INSERT INTO epics (key, title, category) VALUES (?1, ?2, ?3)",
                params![key, title, category.as_str()],
            )?;
            Ok(())
        })
    }

    /// Fetches an epic by key.
    pub fn get_epic(&self, key: &str) -> Result<Epic> {
        let conn = self.lock_conn()?;
        get_epic_on_conn(&conn, key)
    }

    /// Lists all epics, oldest first.
    pub fn list_epics(&self) -> Result<Vec<Epic>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, title, category, status, status_manual, created_at
             FROM epics ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], scan_epic)?;
        let mut epics = Vec::new();
        for row in rows {
            epics.push(row?);
        }
        Ok(epics)
    }

    /// Recomputes and stores the derived state for an epic.
    ///
    /// Manually overridden epics keep their state until the override is
    /// cleared.
    pub fn refresh_epic_state(&self, key: &str) -> Result<EpicState> {
        self.run_in_transaction(|conn| refresh_epic_state_on_conn(conn, key))
    }

    /// Sets an explicit epic state, or clears the override to return to
    /// derivation.
    pub fn override_epic_state(&self, key: &str, state: Option<EpicState>) -> Result<EpicState> {
        self.run_in_transaction(|conn| {
            get_epic_on_conn(conn, key)?;
            match state {
                Some(state) => {
                    conn.execute(
                        "UPDATE epics SET status = ?1, status_manual = 1 WHERE key = ?2",
                        params![state.as_str(), key],
                    )?;
                    Ok(state)
                }
                None => {
                    conn.execute(
                        "UPDATE epics SET status_manual = 0 WHERE key = ?1",
                        params![key],
                    )?;
                    refresh_epic_state_on_conn(conn, key)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emdx_core::task::TaskBuilder;
    use pretty_assertions::assert_eq;

    fn test_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_epic("auth", "Authentication overhaul", Category::Feat)
            .unwrap();
        store
    }

    fn epic_task(store: &SqliteStore, title: &str) -> i64 {
        store
            .create_task(&TaskBuilder::new(title).epic_key("auth").build())
            .unwrap()
    }

    #[test]
    fn create_and_get_epic() {
        let store = test_store();
        let epic = store.get_epic("auth").unwrap();
        assert_eq!(epic.title, "Authentication overhaul");
        assert_eq!(epic.state, EpicState::Open);
        assert!(!epic.state_manual);
    }

    #[test]
    fn duplicate_key_is_conflict() {
        let store = test_store();
        let err = store
            .create_epic("auth", "Again", Category::Feat)
            .unwrap_err();
        assert!(matches!(err, StorageError::ConflictState { .. }));
    }

    #[test]
    fn tasks_get_sequential_epic_seq() {
        let store = test_store();
        let t1 = epic_task(&store, "First");
        let t2 = epic_task(&store, "Second");
        assert_eq!(store.get_task(t1).unwrap().epic_seq, Some(1));
        assert_eq!(store.get_task(t2).unwrap().epic_seq, Some(2));
    }

    #[test]
    fn task_with_unknown_epic_rejected() {
        let store = test_store();
        let err = store
            .create_task(&TaskBuilder::new("Orphan").epic_key("nope").build())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn derived_state_follows_children() {
        let store = test_store();
        let t1 = epic_task(&store, "One");
        let t2 = epic_task(&store, "Two");

        assert_eq!(store.refresh_epic_state("auth").unwrap(), EpicState::Open);

        store
            .transition_task(t1, TaskStatus::Active, None)
            .unwrap();
        assert_eq!(store.refresh_epic_state("auth").unwrap(), EpicState::Active);

        store.transition_task(t1, TaskStatus::Done, None).unwrap();
        store.transition_task(t2, TaskStatus::Wontdo, None).unwrap();
        assert_eq!(store.refresh_epic_state("auth").unwrap(), EpicState::Done);
    }

    #[test]
    fn manual_override_wins_until_cleared() {
        let store = test_store();
        let t1 = epic_task(&store, "Only");
        store.transition_task(t1, TaskStatus::Done, None).unwrap();

        store
            .override_epic_state("auth", Some(EpicState::Active))
            .unwrap();
        assert_eq!(store.refresh_epic_state("auth").unwrap(), EpicState::Active);

        // Clearing the override re-derives.
        assert_eq!(
            store.override_epic_state("auth", None).unwrap(),
            EpicState::Done
        );
    }
}
