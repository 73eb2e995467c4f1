//! Execution struct -- the tracking record for a delegate subprocess.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::ExecStatus;

/// A tracked invocation of the external agent subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Unique id: wall-clock millis, host pid, and a random base36 suffix.
    pub id: String,

    /// The prompt text handed to the agent.
    pub task: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_allowlist: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub status: ExecStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Authoritative full log on disk.
    pub log_path: String,

    /// Bounded ring of the most recent output, for display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_tail: Option<String>,

    #[serde(default)]
    pub tokens_in: i64,

    #[serde(default)]
    pub tokens_out: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,

    /// Document the captured result was saved to, when substantive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id_output: Option<i64>,

    /// Human-readable failure or reconciliation note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Execution {
    /// Creates a pending record for a freshly allocated id.
    pub fn pending(id: impl Into<String>, task: impl Into<String>, log_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            tool_allowlist: None,
            working_dir: None,
            model: None,
            status: ExecStatus::Pending,
            pid: None,
            started_at: Utc::now(),
            last_heartbeat: None,
            completed_at: None,
            exit_code: None,
            log_path: log_path.into(),
            stdout_tail: None,
            tokens_in: 0,
            tokens_out: 0,
            cost_usd: None,
            worktree_path: None,
            branch: None,
            pr_url: None,
            doc_id_output: None,
            reason: None,
        }
    }

    /// Seconds since the last heartbeat, or since start when none was ever
    /// written.
    pub fn heartbeat_age_secs(&self, now: DateTime<Utc>) -> i64 {
        let reference = self.last_heartbeat.unwrap_or(self.started_at);
        (now - reference).num_seconds()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
