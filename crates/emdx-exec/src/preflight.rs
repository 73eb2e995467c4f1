//! Preflight environment validation.
//!
//! Runs before any execution row is written so failures are cheap and the
//! error says exactly what to fix.

use std::path::PathBuf;

use emdx_config::EmdxConfig;
use emdx_git::repo::find_repo_root;

use crate::error::{ExecError, Result};
use crate::job::DelegateJob;
use crate::runner::{find_in_path, AgentRunner};

/// What preflight resolved for the launch step.
#[derive(Debug, Clone)]
pub struct Preflight {
    /// Absolute path of the agent binary.
    pub binary: PathBuf,
    /// Host repository root, when the job asked for isolation.
    pub repo_root: Option<PathBuf>,
}

/// Validates the environment for a job.
pub fn run_preflight(
    config: &EmdxConfig,
    runner: &dyn AgentRunner,
    job: &DelegateJob,
) -> Result<Preflight> {
    let binary = find_in_path(runner.binary()).ok_or_else(|| {
        ExecError::EnvironmentInvalid(format!(
            "agent binary '{}' not found on PATH",
            runner.binary()
        ))
    })?;

    std::fs::create_dir_all(&config.log_dir).map_err(|e| {
        ExecError::EnvironmentInvalid(format!(
            "log dir {} is not writable: {e}",
            config.log_dir.display()
        ))
    })?;
    let probe = config.log_dir.join(".write-probe");
    std::fs::write(&probe, b"ok").map_err(|e| {
        ExecError::EnvironmentInvalid(format!(
            "log dir {} is not writable: {e}",
            config.log_dir.display()
        ))
    })?;
    let _ = std::fs::remove_file(&probe);

    let repo_root = if job.mode.needs_worktree() {
        let anchor = job
            .working_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let root = find_repo_root(&anchor).map_err(|e| {
            ExecError::EnvironmentInvalid(format!(
                "isolation requested but no repository found at {}: {e}",
                anchor.display()
            ))
        })?;
        Some(root)
    } else {
        None
    };

    Ok(Preflight { binary, repo_root })
}
