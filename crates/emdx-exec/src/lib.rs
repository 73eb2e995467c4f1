//! Delegate execution engine.
//!
//! Spawns, isolates, monitors, and captures output of concurrent external
//! agent subprocesses: per-run worktrees, blocking pipe readers, heartbeat
//! liveness, bounded tail buffers, hard timeouts, graceful kill, crash
//! recovery, and PR/branch postprocessing. Everything durable lands on the
//! execution row through short transactions; the log file on disk is the
//! authoritative record of child output.

pub mod error;
pub mod executor;
pub mod heartbeat;
pub mod job;
pub mod postprocess;
pub mod preflight;
pub mod reader;
pub mod recovery;
pub mod runner;
pub mod tail;
pub mod terminal;

pub use error::{ExecError, Result};
pub use executor::{
    extract_final_message, terminate_group, ExecHandle, ExecutionOutcome, Executor, RESULT_MARKER,
};
pub use job::{DelegateJob, ExecMode};
pub use postprocess::{GitHubHost, VcsHost};
pub use recovery::{pid_alive, reconcile_stale_executions};
pub use runner::{AgentRunner, BinaryAgentRunner};
