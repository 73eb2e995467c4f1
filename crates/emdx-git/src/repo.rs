//! Repository discovery and HEAD probes.

use std::path::{Path, PathBuf};

use crate::commands::{git_command, GitError, Result};

/// Resolves the repository root containing `start`, by asking git.
///
/// Returns [`GitError::NotARepo`] when `start` is outside any work tree.
pub fn find_repo_root(start: &Path) -> Result<PathBuf> {
    match git_command(&["rev-parse", "--show-toplevel"], start) {
        Ok(root) => Ok(PathBuf::from(root)),
        Err(GitError::CommandFailed { .. }) => {
            Err(GitError::NotARepo(start.display().to_string()))
        }
        Err(other) => Err(other),
    }
}

/// Returns the current branch name for the repository at `repo`.
pub fn current_branch(repo: &Path) -> Result<String> {
    git_command(&["rev-parse", "--abbrev-ref", "HEAD"], repo)
}

/// Returns the commit hash HEAD points at.
pub fn head_commit(repo: &Path) -> Result<String> {
    git_command(&["rev-parse", "HEAD"], repo)
}

/// Counts commits on `branch` that are not on `base`.
pub fn commits_ahead(repo: &Path, branch: &str, base: &str) -> Result<u64> {
    let range = format!("{base}..{branch}");
    let count = git_command(&["rev-list", "--count", &range], repo)?;
    Ok(count.parse().unwrap_or(0))
}

/// Lists files changed on `branch` relative to `base`.
pub fn changed_files(repo: &Path, branch: &str, base: &str) -> Result<Vec<String>> {
    let range = format!("{base}...{branch}");
    let output = git_command(&["diff", "--name-only", &range], repo)?;
    Ok(output
        .lines()
        .map(str::to_owned)
        .filter(|l| !l.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-b", "main"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "user.name", "test"],
        ] {
            let status = Command::new("git")
                .args(&args)
                .current_dir(dir)
                .status()
                .unwrap();
            assert!(status.success());
        }
    }

    #[test]
    fn discovers_repo_root_from_subdir() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let sub = dir.path().join("a/b");
        std::fs::create_dir_all(&sub).unwrap();

        let root = find_repo_root(&sub).unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn outside_repo_is_not_a_repo() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_repo_root(dir.path()).unwrap_err();
        assert!(matches!(err, GitError::NotARepo(_)));
    }
}
