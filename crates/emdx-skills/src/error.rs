//! Skill and recipe error types.

/// Errors from the recipe/skill runtime.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    /// File or subprocess I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The recipe file was not valid TOML or had a bad shape.
    #[error("failed to parse recipe: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required template variable was not provided.
    #[error("missing required variable: {0}")]
    MissingVariable(String),

    /// A recipe with no steps is a mistake, not an empty success.
    #[error("recipe '{0}' has no steps")]
    NoSteps(String),

    /// A step's delegate run did not complete.
    #[error("step {index} ('{name}') failed: {reason}")]
    StepFailed {
        /// Zero-based step index.
        index: usize,
        /// Step name or its prompt prefix.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// A shell command exited non-zero.
    #[error("shell command failed (exit {code:?}): {stderr}")]
    ShellFailed {
        code: Option<i32>,
        stderr: String,
    },

    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] emdx_storage::StorageError),

    /// The search layer failed.
    #[error(transparent)]
    Search(#[from] emdx_search::SearchError),

    /// The executor failed outside a step boundary.
    #[error(transparent)]
    Exec(#[from] emdx_exec::ExecError),
}

/// Convenience alias used throughout the skills crate.
pub type Result<T> = std::result::Result<T, SkillError>;
