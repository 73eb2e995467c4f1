//! The agent-runner plugin seam.

use std::path::PathBuf;

use crate::job::DelegateJob;

/// Describes how to invoke the external agent binary.
///
/// The executor accepts an implementation at init; production wires a
/// [`BinaryAgentRunner`] for the real agent, tests substitute a shell.
pub trait AgentRunner: Send + Sync {
    /// Binary name or path to execute.
    fn binary(&self) -> &str;

    /// Assembles the argument vector for a job.
    fn build_args(&self, job: &DelegateJob) -> Vec<String>;

    /// Short label used for tagging captured output documents.
    fn agent_type(&self) -> &str;
}

/// Runs a real agent binary with conventional flags.
#[derive(Debug, Clone)]
pub struct BinaryAgentRunner {
    binary: String,
    agent_type: String,
}

impl BinaryAgentRunner {
    pub fn new(binary: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            agent_type: agent_type.into(),
        }
    }
}

impl AgentRunner for BinaryAgentRunner {
    fn binary(&self) -> &str {
        &self.binary
    }

    fn build_args(&self, job: &DelegateJob) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref allowlist) = job.tool_allowlist {
            args.push("--allowed-tools".to_string());
            args.push(allowlist.clone());
        }
        if let Some(ref model) = job.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args.push("--print".to_string());
        args.push(job.prompt.clone());
        args
    }

    fn agent_type(&self) -> &str {
        &self.agent_type
    }
}

/// Resolves a binary name against PATH, mirroring `which`.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = PathBuf::from(binary);
    if path.is_absolute() {
        return path.is_file().then_some(path);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_include_allowlist_and_model() {
        let runner = BinaryAgentRunner::new("agent", "delegate");
        let job = DelegateJob::new("summarize")
            .tool_allowlist("read,grep")
            .model("small");
        let args = runner.build_args(&job);
        assert_eq!(
            args,
            vec!["--allowed-tools", "read,grep", "--model", "small", "--print", "summarize"]
        );
    }

    #[test]
    fn find_in_path_locates_sh() {
        assert!(find_in_path("sh").is_some());
        assert!(find_in_path("definitely-not-a-binary-xyz").is_none());
    }

    #[test]
    fn absolute_path_checked_directly() {
        assert!(find_in_path("/bin/sh").is_some() || find_in_path("/usr/bin/sh").is_some());
    }
}
