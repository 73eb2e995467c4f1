//! Task dependency edges and cycle detection for [`SqliteStore`].

use std::collections::{HashSet, VecDeque};

use rusqlite::{params, Connection};

use emdx_core::task::Task;

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteStore;
use crate::sqlite::tasks::{get_task_on_conn, scan_task, TASK_COLUMNS};

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

/// Detects whether adding `task_id -> depends_on_id` would close a cycle.
///
/// BFS from `depends_on_id` through existing edges; reaching `task_id`
/// means the edge must be refused. O(edges).
fn detect_cycle(conn: &Connection, task_id: i64, depends_on_id: i64) -> Result<()> {
    let mut visited: HashSet<i64> = HashSet::new();
    let mut queue: VecDeque<i64> = VecDeque::new();
    queue.push_back(depends_on_id);

    while let Some(current) = queue.pop_front() {
        if current == task_id {
            return Err(StorageError::conflict(format!(
                "dependency {task_id} -> {depends_on_id} would create a cycle"
            )));
        }
        if !visited.insert(current) {
            continue;
        }
        let mut stmt = conn.prepare_cached(
            "SELECT depends_on_id FROM task_dependencies WHERE task_id = ?1",
        )?;
        let rows = stmt.query_map(params![current], |row| row.get::<_, i64>(0))?;
        for row in rows {
            let next = row?;
            if !visited.contains(&next) {
                queue.push_back(next);
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Adds a dependency edge: `task_id` waits on `depends_on_id`.
    pub fn add_task_dependency(&self, task_id: i64, depends_on_id: i64) -> Result<()> {
        if task_id == depends_on_id {
            return Err(StorageError::invalid_input(
                "a task cannot depend on itself",
            ));
        }
        self.run_in_transaction(|conn| {
            get_task_on_conn(conn, task_id)?;
            get_task_on_conn(conn, depends_on_id)?;
            detect_cycle(conn, task_id, depends_on_id)?;
            conn.execute(
                "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id)
                 VALUES (?1, ?2)",
                params![task_id, depends_on_id],
            )?;
            Ok(())
        })
    }

    /// Removes a dependency edge.
    pub fn remove_task_dependency(&self, task_id: i64, depends_on_id: i64) -> Result<()> {
        self.run_in_transaction(|conn| {
            let affected = conn.execute(
                "DELETE FROM task_dependencies WHERE task_id = ?1 AND depends_on_id = ?2",
                params![task_id, depends_on_id],
            )?;
            if affected == 0 {
                return Err(StorageError::not_found(
                    "dependency",
                    format!("{task_id} -> {depends_on_id}"),
                ));
            }
            Ok(())
        })
    }

    /// Tasks the given task depends on.
    pub fn get_task_dependencies(&self, task_id: i64) -> Result<Vec<Task>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             INNER JOIN task_dependencies td ON tasks.id = td.depends_on_id
             WHERE td.task_id = ?1
             ORDER BY tasks.id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![task_id], scan_task)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    /// Tasks that depend on the given task.
    pub fn get_task_dependents(&self, task_id: i64) -> Result<Vec<Task>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             INNER JOIN task_dependencies td ON tasks.id = td.task_id
             WHERE td.depends_on_id = ?1
             ORDER BY tasks.id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![task_id], scan_task)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emdx_core::task::TaskBuilder;
    use pretty_assertions::assert_eq;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn task(store: &SqliteStore, title: &str) -> i64 {
        store.create_task(&TaskBuilder::new(title).build()).unwrap()
    }

    #[test]
    fn add_and_query_edges() {
        let store = test_store();
        let parent = task(&store, "Parent");
        let child = task(&store, "Child");

        store.add_task_dependency(child, parent).unwrap();

        let deps: Vec<i64> = store
            .get_task_dependencies(child)
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(deps, vec![parent]);

        let dependents: Vec<i64> = store
            .get_task_dependents(parent)
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(dependents, vec![child]);
    }

    #[test]
    fn duplicate_edge_is_idempotent() {
        let store = test_store();
        let a = task(&store, "A");
        let b = task(&store, "B");
        store.add_task_dependency(a, b).unwrap();
        store.add_task_dependency(a, b).unwrap();
        assert_eq!(store.get_task_dependencies(a).unwrap().len(), 1);
    }

    #[test]
    fn self_dependency_rejected() {
        let store = test_store();
        let a = task(&store, "A");
        assert!(store.add_task_dependency(a, a).unwrap_err().is_invalid_input());
    }

    #[test]
    fn cycle_refused() {
        let store = test_store();
        let a = task(&store, "A");
        let b = task(&store, "B");
        let c = task(&store, "C");

        // a -> b -> c
        store.add_task_dependency(a, b).unwrap();
        store.add_task_dependency(b, c).unwrap();

        // c -> a closes the loop.
        let err = store.add_task_dependency(c, a).unwrap_err();
        assert!(matches!(err, StorageError::ConflictState { .. }));
    }

    #[test]
    fn remove_missing_edge_is_not_found() {
        let store = test_store();
        let a = task(&store, "A");
        let b = task(&store, "B");
        assert!(store
            .remove_task_dependency(a, b)
            .unwrap_err()
            .is_not_found());
    }
}
