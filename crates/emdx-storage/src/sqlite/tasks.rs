//! Task CRUD, status transitions, and the ready queue for [`SqliteStore`].

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use emdx_core::enums::{Category, TaskStatus};
use emdx_core::filter::TaskFilter;
use emdx_core::task::{can_transition, Task, TaskLogEntry, TaskLogKind};
use emdx_core::validation::{validate_priority, validate_title};

use crate::error::{Result, StorageError};
use crate::sqlite::documents::{format_datetime, parse_datetime};
use crate::sqlite::store::SqliteStore;

// ---------------------------------------------------------------------------
// Column list (shared between INSERT and SELECT)
// ---------------------------------------------------------------------------

/// All task columns in a deterministic order for SELECT queries.
pub(crate) const TASK_COLUMNS: &str = r#"
    tasks.id, tasks.title, tasks.description, tasks.status,
    tasks.priority, tasks.category, tasks.epic_key, tasks.epic_seq,
    tasks.source_doc_id, tasks.parent_task_id,
    tasks.created_at, tasks.updated_at, tasks.completed_at
"#;

/// Deserialises a row into a [`Task`]. Column order MUST match
/// [`TASK_COLUMNS`].
pub(crate) fn scan_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status_str: String = row.get("status")?;
    let category_str: Option<String> = row.get("category")?;
    let created_at_str: String = row.get("created_at")?;
    let updated_at_str: String = row.get("updated_at")?;
    let completed_at_str: Option<String> = row.get("completed_at")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: TaskStatus::try_from(status_str.as_str()).unwrap_or(TaskStatus::Open),
        priority: row.get("priority")?,
        category: category_str.map(|s| Category::from(s.as_str())),
        epic_key: row.get("epic_key")?,
        epic_seq: row.get("epic_seq")?,
        source_doc_id: row.get("source_doc_id")?,
        parent_task_id: row.get("parent_task_id")?,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
        completed_at: completed_at_str.as_deref().map(parse_datetime),
    })
}

// ---------------------------------------------------------------------------
// Connection-level helpers
// ---------------------------------------------------------------------------

pub(crate) fn get_task_on_conn(conn: &Connection, id: i64) -> Result<Task> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE tasks.id = ?1");
    conn.query_row(&sql, params![id], scan_task)
        .optional()?
        .ok_or_else(|| StorageError::not_found("task", id))
}

/// Appends one immutable entry to the task's history.
pub(crate) fn append_task_log_on_conn(
    conn: &Connection,
    task_id: i64,
    kind: TaskLogKind,
    message: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO task_log (task_id, kind, message) VALUES (?1, ?2, ?3)",
        params![task_id, kind.as_str(), message],
    )?;
    Ok(())
}

/// Inserts a task, assigning the next epic sequence number when the task
/// joins an epic.
pub(crate) fn insert_task_on_conn(conn: &Connection, task: &Task) -> Result<i64> {
    let title = validate_title(&task.title)?;
    validate_priority(task.priority)?;

    let epic_seq: Option<i64> = match task.epic_key {
        Some(ref key) => {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM epics WHERE key = ?1)",
                params![key],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StorageError::not_found("epic", key));
            }
            let next: i64 = conn.query_row(
                "SELECT COALESCE(MAX(epic_seq), 0) + 1 FROM tasks WHERE epic_key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            Some(next)
        }
        None => None,
    };

    let now_str = format_datetime(&Utc::now());
    conn.execute(
        "INSERT INTO tasks
         (title, description, status, priority, category, epic_key, epic_seq,
          source_doc_id, parent_task_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            title,
            task.description,
            task.status.as_str(),
            task.priority,
            task.category.as_ref().map(|c| c.as_str().to_owned()),
            task.epic_key,
            epic_seq,
            task.source_doc_id,
            task.parent_task_id,
            now_str,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Creates a task and returns its id.
    pub fn create_task(&self, task: &Task) -> Result<i64> {
        self.run_in_transaction(|conn| insert_task_on_conn(conn, task))
    }

    /// Fetches a task by id.
    pub fn get_task(&self, id: i64) -> Result<Task> {
        let conn = self.lock_conn()?;
        get_task_on_conn(&conn, id)
    }

    /// Lists tasks matching the filter, ordered by priority then age.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = self.lock_conn()?;

        let mut clauses: Vec<String> = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut idx = 1;

        if let Some(status) = filter.status {
            clauses.push(format!("tasks.status = ?{idx}"));
            param_values.push(Box::new(status.as_str().to_owned()));
            idx += 1;
        }
        if let Some(ref epic_key) = filter.epic_key {
            clauses.push(format!("tasks.epic_key = ?{idx}"));
            param_values.push(Box::new(epic_key.clone()));
            idx += 1;
        }
        if let Some(ref category) = filter.category {
            clauses.push(format!("tasks.category = ?{idx}"));
            param_values.push(Box::new(category.as_str().to_owned()));
            idx += 1;
        }
        if let Some(priority) = filter.priority {
            clauses.push(format!("tasks.priority = ?{idx}"));
            param_values.push(Box::new(priority));
            idx += 1;
        }
        if let Some(source_doc_id) = filter.source_doc_id {
            clauses.push(format!("tasks.source_doc_id = ?{idx}"));
            param_values.push(Box::new(source_doc_id));
            idx += 1;
        }
        let _ = idx;

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let limit_sql = filter
            .limit
            .map(|l| format!(" LIMIT {l}"))
            .unwrap_or_default();
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks{where_sql}
             ORDER BY tasks.priority ASC, tasks.created_at ASC{limit_sql}"
        );

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), scan_task)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    /// Moves a task to a new status, recording the change in the task log.
    ///
    /// Entering `done` sets `completed_at`; leaving it clears it. The status
    /// matrix allows every transition except staying put.
    pub fn transition_task(
        &self,
        id: i64,
        new_status: TaskStatus,
        note: Option<&str>,
    ) -> Result<Task> {
        self.run_in_transaction(|conn| {
            let task = get_task_on_conn(conn, id)?;
            if !can_transition(task.status, new_status) {
                return Err(StorageError::conflict(format!(
                    "task {id} is already {}",
                    task.status
                )));
            }

            let now_str = format_datetime(&Utc::now());
            let completed_at: Option<String> = if new_status == TaskStatus::Done {
                Some(now_str.clone())
            } else {
                None
            };
            conn.execute(
                "UPDATE tasks SET status = ?1, completed_at = ?2, updated_at = ?3 WHERE id = ?4",
                params![new_status.as_str(), completed_at, now_str, id],
            )?;

            let mut message = format!("{} -> {}", task.status, new_status);
            if let Some(note) = note {
                if !note.is_empty() {
                    message.push_str(": ");
                    message.push_str(note);
                }
            }
            append_task_log_on_conn(conn, id, TaskLogKind::StatusChange, &message)?;
            debug!(task = id, from = %task.status, to = %new_status, "task transition");

            get_task_on_conn(conn, id)
        })
    }

    /// Appends a free-form note to the task log.
    pub fn log_task_note(&self, id: i64, text: &str) -> Result<()> {
        self.run_in_transaction(|conn| {
            get_task_on_conn(conn, id)?;
            append_task_log_on_conn(conn, id, TaskLogKind::Note, text)
        })
    }

    /// Returns a task's history, oldest first.
    pub fn get_task_log(&self, id: i64) -> Result<Vec<TaskLogEntry>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, task_id, created_at, kind, message
             FROM task_log WHERE task_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            let kind_str: String = row.get("kind")?;
            Ok(TaskLogEntry {
                id: row.get("id")?,
                task_id: row.get("task_id")?,
                created_at: parse_datetime(&row.get::<_, String>("created_at")?),
                kind: TaskLogKind::try_from(kind_str.as_str()).unwrap_or(TaskLogKind::Note),
                message: row.get("message")?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Links a task to the document it was carved out of.
    pub fn link_task_source(&self, id: i64, doc_id: i64) -> Result<()> {
        self.run_in_transaction(|conn| {
            get_task_on_conn(conn, id)?;
            crate::sqlite::tags::require_document(conn, doc_id)?;
            conn.execute(
                "UPDATE tasks SET source_doc_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![doc_id, format_datetime(&Utc::now()), id],
            )?;
            Ok(())
        })
    }

    /// Tasks that are open with every dependency in a terminal-positive
    /// status, ordered by priority then creation time.
    pub fn ready_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE tasks.status = 'open'
               AND NOT EXISTS (
                   SELECT 1 FROM task_dependencies td
                   INNER JOIN tasks dep ON dep.id = td.depends_on_id
                   WHERE td.task_id = tasks.id
                     AND dep.status NOT IN ('done', 'wontdo')
               )
             ORDER BY tasks.priority ASC, tasks.created_at ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], scan_task)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    /// Permanently deletes a task, its log, and its dependency edges.
    /// Subtasks are detached, not deleted.
    pub fn delete_task(&self, id: i64) -> Result<()> {
        self.run_in_transaction(|conn| {
            conn.execute(
                "UPDATE tasks SET parent_task_id = NULL WHERE parent_task_id = ?1",
                params![id],
            )?;
            let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            if affected == 0 {
                return Err(StorageError::not_found("task", id));
            }
            Ok(())
        })
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

    #[test]
    fn create_and_get_task() {
        let store = test_store();
        let id = store
            .create_task(&TaskBuilder::new("Write tests").priority(2).build())
            .unwrap();
        let task = store.get_task(id).unwrap();
        assert_eq!(task.title, "Write tests");
        assert_eq!(task.priority, 2);
        assert_eq!(task.status, TaskStatus::Open);
    }

    #[test]
    fn invalid_priority_rejected() {
        let store = test_store();
        let err = store
            .create_task(&TaskBuilder::new("Bad").priority(9).build())
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn done_sets_completed_at_and_reopen_clears_it() {
        let store = test_store();
        let id = store.create_task(&TaskBuilder::new("Ship").build()).unwrap();

        let task = store.transition_task(id, TaskStatus::Done, None).unwrap();
        let completed_at = task.completed_at.expect("done sets completed_at");
        assert!(completed_at >= task.created_at);

        let task = store.transition_task(id, TaskStatus::Open, None).unwrap();
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn self_transition_is_conflict() {
        let store = test_store();
        let id = store.create_task(&TaskBuilder::new("Task").build()).unwrap();
        let err = store
            .transition_task(id, TaskStatus::Open, None)
            .unwrap_err();
        assert!(matches!(err, StorageError::ConflictState { .. }));
    }

    #[test]
    fn transition_appends_log_with_note() {
        let store = test_store();
        let id = store.create_task(&TaskBuilder::new("Task").build()).unwrap();

        store
            .transition_task(id, TaskStatus::Active, Some("picking this up"))
            .unwrap();
        store.log_task_note(id, "halfway there").unwrap();

        let log = store.get_task_log(id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, TaskLogKind::StatusChange);
        assert_eq!(log[0].message, "open -> active: picking this up");
        assert_eq!(log[1].kind, TaskLogKind::Note);
        assert_eq!(log[1].message, "halfway there");
    }

    #[test]
    fn ready_queue_scenario() {
        let store = test_store();
        let t1 = store
            .create_task(&TaskBuilder::new("T1").priority(2).build())
            .unwrap();
        let t2 = store
            .create_task(&TaskBuilder::new("T2").priority(1).build())
            .unwrap();
        let t3 = store
            .create_task(&TaskBuilder::new("T3").priority(3).build())
            .unwrap();
        store.add_task_dependency(t2, t1).unwrap();
        store.add_task_dependency(t3, t1).unwrap();

        let ready: Vec<i64> = store.ready_tasks().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ready, vec![t1]);

        store.transition_task(t1, TaskStatus::Done, None).unwrap();
        let ready: Vec<i64> = store.ready_tasks().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ready, vec![t2, t3]);
    }

    #[test]
    fn wontdo_dependency_also_unblocks() {
        let store = test_store();
        let dep = store.create_task(&TaskBuilder::new("Dep").build()).unwrap();
        let task = store.create_task(&TaskBuilder::new("Task").build()).unwrap();
        store.add_task_dependency(task, dep).unwrap();

        store.transition_task(dep, TaskStatus::Wontdo, None).unwrap();
        let ready: Vec<i64> = store.ready_tasks().unwrap().iter().map(|t| t.id).collect();
        assert!(ready.contains(&task));
    }

    #[test]
    fn list_tasks_filters_by_status() {
        let store = test_store();
        let a = store.create_task(&TaskBuilder::new("A").build()).unwrap();
        let b = store.create_task(&TaskBuilder::new("B").build()).unwrap();
        store.transition_task(b, TaskStatus::Active, None).unwrap();

        let open = store
            .list_tasks(&TaskFilter {
                status: Some(TaskStatus::Open),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(open.iter().map(|t| t.id).collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn delete_task_removes_log() {
        let store = test_store();
        let id = store.create_task(&TaskBuilder::new("Task").build()).unwrap();
        store.log_task_note(id, "note").unwrap();
        store.delete_task(id).unwrap();

        assert!(store.get_task(id).unwrap_err().is_not_found());
        let conn = store.lock_conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM task_log WHERE task_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }
}
