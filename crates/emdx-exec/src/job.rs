//! Delegate job description.

use std::path::PathBuf;
use std::time::Duration;

/// How a run relates to the host repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Run in the caller's working directory, no isolation.
    #[default]
    Plain,
    /// Run in a throwaway worktree.
    Worktree,
    /// Worktree + push the branch after success.
    Branch,
    /// Worktree + push + open a pull request after success.
    Pr,
}

impl ExecMode {
    /// Returns `true` when the run needs its own worktree.
    pub fn needs_worktree(&self) -> bool {
        !matches!(self, Self::Plain)
    }

    /// Returns `true` when success is followed by a push.
    pub fn pushes(&self) -> bool {
        matches!(self, Self::Branch | Self::Pr)
    }
}

/// Everything needed to launch one delegate run.
#[derive(Debug, Clone)]
pub struct DelegateJob {
    /// The prompt handed to the agent.
    pub prompt: String,

    /// Tool allowlist flag value, passed through to the agent binary.
    pub tool_allowlist: Option<String>,

    /// Model selector, passed through to the agent binary.
    pub model: Option<String>,

    /// Working directory for plain runs; defaults to the process cwd.
    pub working_dir: Option<PathBuf>,

    pub mode: ExecMode,

    /// Per-job override of the hard timeout.
    pub timeout: Option<Duration>,

    /// Remove the worktree after a clean terminal state.
    pub cleanup: bool,

    /// Persist substantive output as a document.
    pub save_output: bool,
}

impl DelegateJob {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            tool_allowlist: None,
            model: None,
            working_dir: None,
            mode: ExecMode::Plain,
            timeout: None,
            cleanup: false,
            save_output: true,
        }
    }

    pub fn mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn tool_allowlist(mut self, allowlist: impl Into<String>) -> Self {
        self.tool_allowlist = Some(allowlist.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn save_output(mut self, save: bool) -> Self {
        self.save_output = save;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_predicates() {
        assert!(!ExecMode::Plain.needs_worktree());
        assert!(ExecMode::Worktree.needs_worktree());
        assert!(!ExecMode::Worktree.pushes());
        assert!(ExecMode::Branch.pushes());
        assert!(ExecMode::Pr.pushes());
    }

    #[test]
    fn builder_defaults() {
        let job = DelegateJob::new("do the thing");
        assert_eq!(job.mode, ExecMode::Plain);
        assert!(job.timeout.is_none());
        assert!(job.save_output);
        assert!(!job.cleanup);
    }
}
