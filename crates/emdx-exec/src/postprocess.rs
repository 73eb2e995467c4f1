//! PR/branch postprocessing and the VCS host seam.

use std::path::Path;

use tracing::info;

use emdx_git::repo::{changed_files, commits_ahead};
use emdx_git::{git_command, Worktree, WorktreeManager};

use crate::error::{ExecError, Result};

/// Creates pull requests on the external VCS host.
///
/// One seam, two methods; the executor accepts an implementation at init
/// and PR mode simply fails with `EnvironmentInvalid` when none is wired.
pub trait VcsHost: Send + Sync {
    /// Opens a PR of `branch` onto `base` in `owner_repo` ("owner/name").
    /// Returns the PR URL.
    fn create_pr(
        &self,
        owner_repo: &str,
        branch: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> std::result::Result<String, String>;

    /// Host label used in reasons and logs.
    fn host_name(&self) -> &str;
}

/// GitHub implementation over the REST API.
pub struct GitHubHost {
    token: String,
    api_base: String,
}

impl GitHubHost {
    /// `token` comes from the environment at init; it is never stored in
    /// config or logged.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: "https://api.github.com".to_string(),
        }
    }

    /// Points the client at a different API root (tests, GHE).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

impl VcsHost for GitHubHost {
    fn create_pr(
        &self,
        owner_repo: &str,
        branch: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> std::result::Result<String, String> {
        let url = format!("{}/repos/{owner_repo}/pulls", self.api_base);
        let payload = serde_json::json!({
            "title": title,
            "head": branch,
            "base": base,
            "body": body,
        });

        let mut response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "emdx")
            .send_json(&payload)
            .map_err(|e| format!("PR creation request failed: {e}"))?;

        let json: serde_json::Value = response
            .body_mut()
            .read_json()
            .map_err(|e| format!("PR creation returned unreadable body: {e}"))?;
        json.get("html_url")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| format!("PR creation response had no html_url: {json}"))
    }

    fn host_name(&self) -> &str {
        "github"
    }
}

/// Extracts "owner/name" from a git remote URL.
///
/// Understands `git@host:owner/name.git` and `https://host/owner/name[.git]`.
pub fn parse_owner_repo(remote_url: &str) -> Option<String> {
    let trimmed = remote_url.trim().trim_end_matches(".git");
    let path = if let Some((_, path)) = trimmed.split_once(':') {
        // scp-like syntax, or a URL whose "path" starts after the scheme.
        path.trim_start_matches("//")
    } else {
        trimmed
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return None;
    }
    let name = segments[segments.len() - 1];
    let owner = segments[segments.len() - 2];
    if owner.contains('.') && segments.len() == 2 {
        // "host.com/name" without an owner segment.
        return None;
    }
    Some(format!("{owner}/{name}"))
}

/// Finds the first PR URL in captured output, if any.
pub fn detect_pr_url(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|token| token.starts_with("https://") && token.contains("/pull/"))
        .map(|token| token.trim_end_matches([',', '.', ')', ']']).to_owned())
}

/// Validates that a finished branch run actually produced something to
/// push: new commits and at least one changed file.
pub fn validate_branch_result(repo_root: &Path, branch: &str, base: &str) -> Result<()> {
    let ahead = commits_ahead(repo_root, branch, base)?;
    if ahead == 0 {
        return Err(ExecError::PostprocessFailed(format!(
            "branch {branch} has no new commits on top of {base}"
        )));
    }
    let files = changed_files(repo_root, branch, base)?;
    if files.is_empty() {
        return Err(ExecError::PostprocessFailed(format!(
            "branch {branch} changed no files relative to {base}"
        )));
    }
    Ok(())
}

/// Pushes the branch and, for PR mode, opens the pull request.
///
/// Returns the PR URL when one was created.
pub fn push_and_maybe_pr(
    manager: &WorktreeManager,
    worktree: &Worktree,
    base_branch: &str,
    open_pr: bool,
    vcs: Option<&dyn VcsHost>,
    title: &str,
    body: &str,
) -> Result<Option<String>> {
    validate_branch_result(manager.repo_root(), &worktree.branch, base_branch)?;

    manager
        .push(worktree)
        .map_err(|e| ExecError::PostprocessFailed(format!("push failed: {e}")))?;

    if !open_pr {
        return Ok(None);
    }

    let vcs = vcs.ok_or_else(|| {
        ExecError::PostprocessFailed("PR mode requested but no VCS host is configured".into())
    })?;
    let remote = git_command(&["remote", "get-url", "origin"], manager.repo_root())?;
    let owner_repo = parse_owner_repo(&remote).ok_or_else(|| {
        ExecError::PostprocessFailed(format!("cannot parse owner/repo from remote '{remote}'"))
    })?;

    let pr_url = vcs
        .create_pr(&owner_repo, &worktree.branch, base_branch, title, body)
        .map_err(ExecError::Integration)?;
    info!(host = vcs.host_name(), pr_url, "opened pull request");
    Ok(Some(pr_url))
}
