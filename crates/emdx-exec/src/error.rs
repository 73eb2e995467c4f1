//! Executor error taxonomy.
//!
//! Each failure kind yields a structured execution-row update plus a
//! human-readable reason; nothing here is swallowed silently.

use emdx_storage::StorageError;

/// Errors from the delegate executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Preflight found the environment unusable (missing binary, unwritable
    /// log dir, unresolvable repository).
    #[error("environment invalid: {0}")]
    EnvironmentInvalid(String),

    /// Worktree/branch name generation exhausted its retries.
    #[error("worktree name collision persisted after {attempts} attempts")]
    WorktreeCollision {
        /// How many names were tried.
        attempts: u32,
    },

    /// OS-level process creation failed.
    #[error("failed to spawn agent process: {0}")]
    SpawnFailed(String),

    /// The execution hit its hard timeout.
    #[error("execution {execution_id} timed out")]
    Timeout {
        /// The affected execution.
        execution_id: String,
    },

    /// The execution was cancelled.
    #[error("execution {execution_id} was killed")]
    Killed {
        /// The affected execution.
        execution_id: String,
    },

    /// The subprocess exited non-zero.
    #[error("agent exited with code {code}")]
    NonZeroExit {
        /// The child's exit code, preserved on the row.
        code: i32,
    },

    /// The run completed but the PR/branch step failed.
    #[error("postprocess failed: {0}")]
    PostprocessFailed(String),

    /// The external PR host was unreachable or rejected the request.
    #[error("integration error: {0}")]
    Integration(String),

    /// A git operation failed.
    #[error(transparent)]
    Git(#[from] emdx_git::GitError),

    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// File or pipe I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the executor crate.
pub type Result<T> = std::result::Result<T, ExecError>;

impl ExecError {
    /// The exit code this error maps to at the CLI boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Timeout { .. } => 124,
            Self::Killed { .. } => 130,
            Self::NonZeroExit { code } => *code,
            _ => 1,
        }
    }
}
