//! Worktree management for isolated delegate runs.
//!
//! Each delegate execution that asks for isolation gets its own worktree
//! under a shared base directory, on a fresh branch. Worktrees share the
//! host repository's object database but never each other's files.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::commands::{git_command, GitError, Result};

/// A created worktree: its directory and the branch checked out in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub path: PathBuf,
    pub branch: String,
}

/// Creates and removes worktrees for a single host repository.
#[derive(Debug, Clone)]
pub struct WorktreeManager {
    repo_root: PathBuf,
    base_dir: PathBuf,
}

impl WorktreeManager {
    /// `repo_root` is the host repository; `base_dir` is where worktree
    /// directories are placed (created on demand).
    pub fn new(repo_root: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            base_dir: base_dir.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Creates a worktree named `name` on new branch `branch`.
    ///
    /// Fails if either the directory or the branch already exists; callers
    /// retry with a fresh suffix.
    pub fn add(&self, name: &str, branch: &str) -> Result<Worktree> {
        std::fs::create_dir_all(&self.base_dir)?;
        let path = self.base_dir.join(name);
        if path.exists() {
            return Err(GitError::CommandFailed {
                code: None,
                stderr: format!("worktree path already exists: {}", path.display()),
            });
        }

        let path_str = path.display().to_string();
        git_command(
            &["worktree", "add", "-b", branch, &path_str],
            &self.repo_root,
        )?;
        info!(path = %path.display(), branch, "created worktree");
        Ok(Worktree {
            path,
            branch: branch.to_owned(),
        })
    }

    /// Returns `true` when the worktree has no uncommitted changes.
    pub fn is_clean(&self, path: &Path) -> Result<bool> {
        let status = git_command(&["status", "--porcelain"], path)?;
        Ok(status.is_empty())
    }

    /// Removes a worktree directory and prunes git's bookkeeping.
    ///
    /// `force` discards uncommitted changes; without it, a dirty worktree is
    /// an error.
    pub fn remove(&self, path: &Path, force: bool) -> Result<()> {
        let path_str = path.display().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        git_command(&args, &self.repo_root)?;
        debug!(path = %path.display(), "removed worktree");
        Ok(())
    }

    /// Lists worktree paths registered on the host repository.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let output = git_command(&["worktree", "list", "--porcelain"], &self.repo_root)?;
        Ok(output
            .lines()
            .filter_map(|line| line.strip_prefix("worktree "))
            .map(PathBuf::from)
            .collect())
    }

    /// Pushes the worktree's branch to origin, setting upstream.
    pub fn push(&self, worktree: &Worktree) -> Result<()> {
        git_command(
            &["push", "-u", "origin", &worktree.branch],
            &worktree.path,
        )?;
        info!(branch = %worktree.branch, "pushed branch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn init_repo_with_commit(dir: &Path) {
        for args in [
            vec!["init", "-b", "main"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "user.name", "test"],
        ] {
            assert!(Command::new("git")
                .args(&args)
                .current_dir(dir)
                .status()
                .unwrap()
                .success());
        }
        std::fs::write(dir.join("README.md"), "seed\n").unwrap();
        for args in [vec!["add", "."], vec!["commit", "-m", "seed"]] {
            assert!(Command::new("git")
                .args(&args)
                .current_dir(dir)
                .status()
                .unwrap()
                .success());
        }
    }

    #[test]
    fn add_and_remove_worktree() {
        let repo = tempfile::tempdir().unwrap();
        let base = tempfile::tempdir().unwrap();
        init_repo_with_commit(repo.path());

        let mgr = WorktreeManager::new(repo.path(), base.path());
        let wt = mgr.add("fix-bug-abc12345", "emdx/fix-bug-ab012").unwrap();
        assert!(wt.path.is_dir());
        assert!(mgr.is_clean(&wt.path).unwrap());
        assert!(mgr.list().unwrap().iter().any(|p| p.ends_with("fix-bug-abc12345")));

        mgr.remove(&wt.path, false).unwrap();
        assert!(!wt.path.exists());
    }

    #[test]
    fn duplicate_worktree_path_rejected() {
        let repo = tempfile::tempdir().unwrap();
        let base = tempfile::tempdir().unwrap();
        init_repo_with_commit(repo.path());

        let mgr = WorktreeManager::new(repo.path(), base.path());
        mgr.add("dup-name", "emdx/dup-a").unwrap();
        assert!(mgr.add("dup-name", "emdx/dup-b").is_err());
    }

    #[test]
    fn dirty_worktree_detected() {
        let repo = tempfile::tempdir().unwrap();
        let base = tempfile::tempdir().unwrap();
        init_repo_with_commit(repo.path());

        let mgr = WorktreeManager::new(repo.path(), base.path());
        let wt = mgr.add("dirty-check", "emdx/dirty-check").unwrap();
        std::fs::write(wt.path.join("scratch.txt"), "uncommitted").unwrap();
        assert!(!mgr.is_clean(&wt.path).unwrap());

        // Non-forced removal of a dirty worktree must fail.
        assert!(mgr.remove(&wt.path, false).is_err());
        mgr.remove(&wt.path, true).unwrap();
    }
}
