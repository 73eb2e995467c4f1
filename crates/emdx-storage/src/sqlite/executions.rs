//! Execution row lifecycle for [`SqliteStore`].
//!
//! The executor writes through these methods only; each is a short
//! transaction so no connection is held across a subprocess wait.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::warn;

use emdx_core::enums::ExecStatus;
use emdx_core::execution::Execution;
use emdx_core::filter::ExecutionFilter;

use crate::error::{Result, StorageError};
use crate::sqlite::documents::{format_datetime, parse_datetime};
use crate::sqlite::store::SqliteStore;

// ---------------------------------------------------------------------------
// Column list (shared between INSERT and SELECT)
// ---------------------------------------------------------------------------

/// All execution columns in a deterministic order for SELECT queries.
pub(crate) const EXEC_COLUMNS: &str = r#"
    executions.id, executions.task, executions.tool_allowlist,
    executions.working_dir, executions.model, executions.status,
    executions.pid, executions.started_at, executions.last_heartbeat,
    executions.completed_at, executions.exit_code, executions.log_path,
    executions.stdout_tail, executions.tokens_in, executions.tokens_out,
    executions.cost_usd, executions.worktree_path, executions.branch,
    executions.pr_url, executions.doc_id_output, executions.reason
"#;

/// Deserialises a row into an [`Execution`]. Column order MUST match
/// [`EXEC_COLUMNS`].
pub(crate) fn scan_execution(row: &Row<'_>) -> rusqlite::Result<Execution> {
    let status_str: String = row.get("status")?;
    let started_at_str: String = row.get("started_at")?;
    let last_heartbeat_str: Option<String> = row.get("last_heartbeat")?;
    let completed_at_str: Option<String> = row.get("completed_at")?;

    Ok(Execution {
        id: row.get("id")?,
        task: row.get("task")?,
        tool_allowlist: row.get("tool_allowlist")?,
        working_dir: row.get("working_dir")?,
        model: row.get("model")?,
        status: ExecStatus::try_from(status_str.as_str()).unwrap_or(ExecStatus::Failed),
        pid: row.get("pid")?,
        started_at: parse_datetime(&started_at_str),
        last_heartbeat: last_heartbeat_str.as_deref().map(parse_datetime),
        completed_at: completed_at_str.as_deref().map(parse_datetime),
        exit_code: row.get("exit_code")?,
        log_path: row.get("log_path")?,
        stdout_tail: row.get("stdout_tail")?,
        tokens_in: row.get("tokens_in")?,
        tokens_out: row.get("tokens_out")?,
        cost_usd: row.get("cost_usd")?,
        worktree_path: row.get("worktree_path")?,
        branch: row.get("branch")?,
        pr_url: row.get("pr_url")?,
        doc_id_output: row.get("doc_id_output")?,
        reason: row.get("reason")?,
    })
}

impl SqliteStore {
    /// Inserts a freshly allocated execution row.
    pub fn insert_execution(&self, execution: &Execution) -> Result<()> {
        self.run_in_transaction(|conn| {
            conn.execute(
                "INSERT INTO executions
                 (id, task, tool_allowlist, working_dir, model, status, started_at,
                  log_path, worktree_path, branch)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    execution.id,
                    execution.task,
                    execution.tool_allowlist,
                    execution.working_dir,
                    execution.model,
                    execution.status.as_str(),
                    format_datetime(&execution.started_at),
                    execution.log_path,
                    execution.worktree_path,
                    execution.branch,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetches an execution by id.
    pub fn get_execution(&self, id: &str) -> Result<Execution> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {EXEC_COLUMNS} FROM executions WHERE executions.id = ?1");
        conn.query_row(&sql, params![id], scan_execution)
            .optional()?
            .ok_or_else(|| StorageError::not_found("execution", id))
    }

    /// Lists executions, newest first.
    pub fn list_executions(&self, filter: &ExecutionFilter) -> Result<Vec<Execution>> {
        let conn = self.lock_conn()?;
        let mut clauses: Vec<String> = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut idx = 1;

        if let Some(status) = filter.status {
            clauses.push(format!("executions.status = ?{idx}"));
            param_values.push(Box::new(status.as_str().to_owned()));
            idx += 1;
        }
        if let Some(started_after) = filter.started_after {
            clauses.push(format!("executions.started_at >= ?{idx}"));
            param_values.push(Box::new(format_datetime(&started_after)));
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
            "SELECT {EXEC_COLUMNS} FROM executions{where_sql}
             ORDER BY executions.started_at DESC{limit_sql}"
        );

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), scan_execution)?;
        let mut executions = Vec::new();
        for row in rows {
            executions.push(row?);
        }
        Ok(executions)
    }

    /// Transitions pending -> running, recording the child pid and seeding
    /// the heartbeat.
    pub fn mark_execution_running(&self, id: &str, pid: i32) -> Result<()> {
        let now_str = format_datetime(&Utc::now());
        self.run_in_transaction(|conn| {
            let affected = conn.execute(
                "UPDATE executions SET status = 'running', pid = ?1, last_heartbeat = ?2
                 WHERE id = ?3 AND status = 'pending'",
                params![pid, now_str, id],
            )?;
            if affected == 0 {
                return Err(StorageError::conflict(format!(
                    "execution {id} is not pending"
                )));
            }
            Ok(())
        })
    }

    /// Refreshes the liveness heartbeat for a running execution.
    pub fn update_execution_heartbeat(&self, id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE executions SET last_heartbeat = ?1 WHERE id = ?2 AND status = 'running'",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    /// Stores the bounded output tail for display.
    pub fn set_execution_tail(&self, id: &str, tail: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE executions SET stdout_tail = ?1 WHERE id = ?2",
            params![tail, id],
        )?;
        Ok(())
    }

    /// Moves an execution to a terminal status, finalizing the row.
    pub fn complete_execution(
        &self,
        id: &str,
        status: ExecStatus,
        exit_code: Option<i32>,
        reason: Option<&str>,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(StorageError::invalid_input(format!(
                "{status} is not a terminal status"
            )));
        }
        self.run_in_transaction(|conn| {
            let affected = conn.execute(
                "UPDATE executions
                 SET status = ?1, exit_code = ?2, completed_at = ?3,
                     reason = COALESCE(?4, reason)
                 WHERE id = ?5",
                params![
                    status.as_str(),
                    exit_code,
                    format_datetime(&Utc::now()),
                    reason,
                    id
                ],
            )?;
            if affected == 0 {
                return Err(StorageError::not_found("execution", id));
            }
            Ok(())
        })
    }

    /// Records token usage and cost reported by the agent.
    pub fn set_execution_usage(
        &self,
        id: &str,
        tokens_in: i64,
        tokens_out: i64,
        cost_usd: Option<f64>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE executions SET tokens_in = ?1, tokens_out = ?2, cost_usd = ?3 WHERE id = ?4",
            params![tokens_in, tokens_out, cost_usd, id],
        )?;
        Ok(())
    }

    /// Records the worktree and branch created for an isolated run.
    pub fn set_execution_worktree(
        &self,
        id: &str,
        worktree_path: &str,
        branch: &str,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE executions SET worktree_path = ?1, branch = ?2, working_dir = ?1 WHERE id = ?3",
            params![worktree_path, branch, id],
        )?;
        Ok(())
    }

    /// Records the PR URL captured from the host tool's output.
    pub fn set_execution_pr_url(&self, id: &str, pr_url: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE executions SET pr_url = ?1 WHERE id = ?2",
            params![pr_url, id],
        )?;
        Ok(())
    }

    /// Links the document the captured output was saved to.
    pub fn set_execution_output_doc(&self, id: &str, doc_id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE executions SET doc_id_output = ?1 WHERE id = ?2",
            params![doc_id, id],
        )?;
        Ok(())
    }

    /// Reconciles an orphaned running execution to failed with a note.
    ///
    /// Used by startup recovery and `maintain cleanup`; the worktree is left
    /// for the operator to inspect.
    pub fn reconcile_stale_execution(&self, id: &str, note: &str) -> Result<()> {
        warn!(execution = id, note, "reconciling stale execution");
        self.run_in_transaction(|conn| {
            let affected = conn.execute(
                "UPDATE executions
                 SET status = 'failed', exit_code = 124, completed_at = ?1,
                     reason = CASE
                         WHEN reason IS NULL OR reason = '' THEN ?2
                         ELSE reason || '; ' || ?2
                     END
                 WHERE id = ?3 AND status = 'running'",
                params![format_datetime(&Utc::now()), note, id],
            )?;
            if affected == 0 {
                return Err(StorageError::conflict(format!(
                    "execution {id} is not running"
                )));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn pending(store: &SqliteStore, id: &str) -> Execution {
        let exec = Execution::pending(id, "summarize the repo", format!("/tmp/{id}.log"));
        store.insert_execution(&exec).unwrap();
        exec
    }

    #[test]
    fn insert_and_get_round_trip() {
        let store = test_store();
        pending(&store, "1712-1-aaaaaa");

        let exec = store.get_execution("1712-1-aaaaaa").unwrap();
        assert_eq!(exec.status, ExecStatus::Pending);
        assert_eq!(exec.task, "summarize the repo");
        assert!(exec.pid.is_none());
    }

    #[test]
    fn running_requires_pending() {
        let store = test_store();
        pending(&store, "e1");

        store.mark_execution_running("e1", 4242).unwrap();
        let exec = store.get_execution("e1").unwrap();
        assert_eq!(exec.status, ExecStatus::Running);
        assert_eq!(exec.pid, Some(4242));
        assert!(exec.last_heartbeat.is_some());

        // A second mark is a conflict.
        assert!(matches!(
            store.mark_execution_running("e1", 4242).unwrap_err(),
            StorageError::ConflictState { .. }
        ));
    }

    #[test]
    fn complete_sets_terminal_fields() {
        let store = test_store();
        pending(&store, "e1");
        store.mark_execution_running("e1", 1).unwrap();
        store
            .complete_execution("e1", ExecStatus::Completed, Some(0), None)
            .unwrap();

        let exec = store.get_execution("e1").unwrap();
        assert_eq!(exec.status, ExecStatus::Completed);
        assert_eq!(exec.exit_code, Some(0));
        assert!(exec.completed_at.is_some());
    }

    #[test]
    fn complete_rejects_non_terminal_status() {
        let store = test_store();
        pending(&store, "e1");
        assert!(store
            .complete_execution("e1", ExecStatus::Running, None, None)
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn heartbeat_age_survives_round_trip() {
        let store = test_store();
        pending(&store, "aged");
        store.mark_execution_running("aged", 2).unwrap();

        // Age the heartbeat three hours into the past and read it back.
        {
            let conn = store.lock_conn().unwrap();
            let old = format_datetime(&(Utc::now() - Duration::hours(3)));
            conn.execute(
                "UPDATE executions SET last_heartbeat = ?1 WHERE id = 'aged'",
                params![old],
            )
            .unwrap();
        }

        let exec = store.get_execution("aged").unwrap();
        let age = exec.heartbeat_age_secs(Utc::now());
        assert!(age >= 3 * 3600 - 5, "got {age}");
    }

    #[test]
    fn reconcile_marks_failed_with_note() {
        let store = test_store();
        pending(&store, "e1");
        store.mark_execution_running("e1", 99999).unwrap();

        store
            .reconcile_stale_execution("e1", "stale_reconciled")
            .unwrap();
        let exec = store.get_execution("e1").unwrap();
        assert_eq!(exec.status, ExecStatus::Failed);
        assert_eq!(exec.exit_code, Some(124));
        assert_eq!(exec.reason.as_deref(), Some("stale_reconciled"));

        // Already reconciled: no longer running.
        assert!(store
            .reconcile_stale_execution("e1", "again")
            .is_err());
    }

    #[test]
    fn usage_and_outputs_recorded() {
        let store = test_store();
        pending(&store, "e1");
        store.set_execution_usage("e1", 1200, 800, Some(0.42)).unwrap();
        store.set_execution_pr_url("e1", "https://example.com/pr/7").unwrap();
        store.set_execution_tail("e1", "last lines").unwrap();

        let exec = store.get_execution("e1").unwrap();
        assert_eq!(exec.tokens_in, 1200);
        assert_eq!(exec.tokens_out, 800);
        assert_eq!(exec.cost_usd, Some(0.42));
        assert_eq!(exec.pr_url.as_deref(), Some("https://example.com/pr/7"));
        assert_eq!(exec.stdout_tail.as_deref(), Some("last lines"));
    }
}
