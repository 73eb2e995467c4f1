//! Crash recovery: reconciling orphaned execution rows.
//!
//! An engine crash (or host reboot) leaves `running` rows whose children
//! are gone. On startup -- and on demand through `maintain cleanup` -- any
//! running row whose pid is dead or whose heartbeat is older than the stale
//! threshold becomes `failed` with exit code 124 and a `stale_reconciled`
//! note. Worktrees are never touched here; the operator decides cleanup.

use std::time::Duration;

use chrono::Utc;
use tracing::info;

use emdx_core::enums::ExecStatus;
use emdx_core::filter::ExecutionFilter;
use emdx_storage::SqliteStore;

use crate::error::Result;

/// Canonical staleness threshold for startup reconciliation.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(2 * 60 * 60);

/// Note recorded on reconciled rows.
pub const STALE_NOTE: &str = "stale_reconciled";

/// Returns `true` if a process with this pid exists.
#[cfg(unix)]
pub fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // Signal 0 probes existence without delivering anything. EPERM means
    // the process exists but belongs to someone else.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: i32) -> bool {
    false
}

/// Reconciles orphaned running executions; returns the affected ids.
///
/// A running row is orphaned when its pid is not alive, or its heartbeat
/// (falling back to start time) is older than `stale_threshold`.
pub fn reconcile_stale_executions(
    store: &SqliteStore,
    stale_threshold: Duration,
) -> Result<Vec<String>> {
    let running = store.list_executions(&ExecutionFilter {
        status: Some(ExecStatus::Running),
        ..Default::default()
    })?;

    let now = Utc::now();
    let threshold_secs = stale_threshold.as_secs() as i64;
    let mut reconciled = Vec::new();

    for execution in running {
        let dead_pid = match execution.pid {
            Some(pid) => !pid_alive(pid),
            None => true,
        };
        let stale = execution.heartbeat_age_secs(now) > threshold_secs;
        if !dead_pid && !stale {
            continue;
        }

        store.reconcile_stale_execution(&execution.id, STALE_NOTE)?;
        info!(
            execution = %execution.id,
            dead_pid,
            stale,
            "reconciled orphaned execution"
        );
        reconciled.push(execution.id);
    }
    Ok(reconciled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use emdx_core::execution::Execution;
    use pretty_assertions::assert_eq;

    fn running_row(store: &SqliteStore, id: &str, pid: i32) {
        store
            .insert_execution(&Execution::pending(id, "task", format!("/tmp/{id}.log")))
            .unwrap();
        store.mark_execution_running(id, pid).unwrap();
    }

    #[test]
    fn own_pid_is_alive() {
        assert!(pid_alive(std::process::id() as i32));
        assert!(!pid_alive(0));
    }

    #[test]
    fn dead_pid_is_reconciled() {
        let store = SqliteStore::open_in_memory().unwrap();
        // A pid from far beyond pid_max on typical hosts.
        running_row(&store, "dead", i32::MAX - 7);
        running_row(&store, "alive", std::process::id() as i32);

        let reconciled =
            reconcile_stale_executions(&store, DEFAULT_STALE_THRESHOLD).unwrap();
        assert_eq!(reconciled, vec!["dead"]);

        let dead = store.get_execution("dead").unwrap();
        assert_eq!(dead.status, ExecStatus::Failed);
        assert_eq!(dead.exit_code, Some(124));
        assert_eq!(dead.reason.as_deref(), Some(STALE_NOTE));

        let alive = store.get_execution("alive").unwrap();
        assert_eq!(alive.status, ExecStatus::Running);
    }

    #[test]
    fn stale_heartbeat_reconciles_even_with_live_pid() {
        let store = SqliteStore::open_in_memory().unwrap();
        running_row(&store, "stale", std::process::id() as i32);

        // A zero threshold makes any heartbeat stale.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let reconciled = reconcile_stale_executions(&store, Duration::ZERO).unwrap();
        assert_eq!(reconciled, vec!["stale"]);
    }

    #[test]
    fn terminal_rows_untouched() {
        let store = SqliteStore::open_in_memory().unwrap();
        running_row(&store, "done", 1);
        store
            .complete_execution("done", ExecStatus::Completed, Some(0), None)
            .unwrap();

        let reconciled = reconcile_stale_executions(&store, Duration::ZERO).unwrap();
        assert!(reconciled.is_empty());
    }
}
