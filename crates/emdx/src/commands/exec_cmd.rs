//! `emdx exec` -- execution inspection and control.

use anyhow::Result;
use chrono::Utc;

use emdx_core::enums::ExecStatus;
use emdx_core::filter::ExecutionFilter;
use emdx_exec::{pid_alive, reconcile_stale_executions};
use emdx_storage::StorageError;

use crate::cli::{ExecArgs, ExecCommands};
use crate::context::RuntimeContext;
use crate::output::{format_execution_row, output_json, output_table};

const EXEC_HEADERS: &[&str] = &["ID", "STATUS", "PID", "STARTED", "EXIT", "TASK"];

/// Execute the `emdx exec` command family.
pub fn run(ctx: &RuntimeContext, args: &ExecArgs) -> Result<()> {
    let store = ctx.open_store()?;

    match args.command {
        ExecCommands::List { ref status, limit } => {
            let status = status
                .as_deref()
                .map(ExecStatus::try_from)
                .transpose()
                .map_err(StorageError::from)?;
            let executions = store.list_executions(&ExecutionFilter {
                status,
                limit: Some(limit),
                ..Default::default()
            })?;
            if ctx.json {
                output_json(&executions);
            } else {
                output_table(
                    EXEC_HEADERS,
                    &executions.iter().map(format_execution_row).collect::<Vec<_>>(),
                );
            }
        }
        ExecCommands::Health => {
            let reconciled = reconcile_stale_executions(
                &store,
                emdx_exec::recovery::DEFAULT_STALE_THRESHOLD,
            )?;
            let running = store.list_executions(&ExecutionFilter {
                status: Some(ExecStatus::Running),
                ..Default::default()
            })?;

            if ctx.json {
                let now = Utc::now();
                let running_view: Vec<serde_json::Value> = running
                    .iter()
                    .map(|exec| {
                        serde_json::json!({
                            "id": exec.id,
                            "pid": exec.pid,
                            "pid_alive": exec.pid.map(pid_alive),
                            "heartbeat_age_s": exec.heartbeat_age_secs(now),
                        })
                    })
                    .collect();
                output_json(&serde_json::json!({
                    "reconciled": reconciled,
                    "running": running_view,
                }));
            } else {
                if !reconciled.is_empty() {
                    println!("Reconciled stale executions: {}", reconciled.join(", "));
                }
                if running.is_empty() {
                    println!("No running executions.");
                } else {
                    output_table(
                        EXEC_HEADERS,
                        &running.iter().map(format_execution_row).collect::<Vec<_>>(),
                    );
                }
            }
        }
        ExecCommands::Kill { ref execution_id } => {
            // Cross-process kill: signal the recorded pid group, then
            // finalize the row.
            let row = store.get_execution(execution_id)?;
            if row.status != ExecStatus::Running {
                return Err(StorageError::conflict(format!(
                    "execution {execution_id} is not running"
                ))
                .into());
            }
            if let Some(pid) = row.pid {
                emdx_exec::terminate_group(
                    pid,
                    std::time::Duration::from_secs(ctx.config.kill_grace_s),
                );
            }
            store.complete_execution(
                execution_id,
                ExecStatus::Killed,
                Some(130),
                Some("killed by operator"),
            )?;
            if ctx.json {
                output_json(&serde_json::json!({ "id": execution_id, "killed": true }));
            } else if !ctx.quiet {
                println!("Killed {execution_id}");
            }
        }
        ExecCommands::Tail { ref execution_id } => {
            let row = store.get_execution(execution_id)?;
            let tail = row.stdout_tail.unwrap_or_default();
            if ctx.json {
                output_json(&serde_json::json!({ "id": execution_id, "tail": tail }));
            } else {
                println!("{tail}");
            }
        }
    }
    Ok(())
}
