//! Configuration types and the figment loading pipeline.

use std::env;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory name under the platform config root.
pub const DEFAULT_APP_DIR: &str = "emdx";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration sources could not be merged or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// No home directory could be resolved to anchor default paths.
    #[error("cannot resolve a home directory for default paths")]
    NoHomeDir,

    /// A configuration value was out of range.
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue {
        /// The offending key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Upper bound on concurrent delegate executions.
const MAX_CONCURRENT_CAP: usize = 10;

/// Runtime configuration for the whole system.
///
/// Every path and tunable the core needs lives here; nothing reads the
/// environment after load except the VCS token, which is deliberately left
/// out of the config value so it never lands in logs or serialized output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmdxConfig {
    /// Directory holding config.toml and the database.
    pub config_dir: PathBuf,

    /// Directory holding mutable runtime state (execution logs, worktrees).
    pub state_dir: PathBuf,

    /// Path to the SQLite database file.
    pub db_path: PathBuf,

    /// Directory for per-execution log files.
    pub log_dir: PathBuf,

    /// Maximum delegate executions in flight (capped at 10).
    pub max_concurrent: usize,

    /// Seconds between child heartbeat writes.
    pub heartbeat_interval_s: u64,

    /// Seconds without a heartbeat before a running child is suspect.
    pub liveness_timeout_s: u64,

    /// Hard per-execution timeout in seconds.
    pub execution_timeout_s: u64,

    /// Grace window between SIGTERM and SIGKILL.
    pub kill_grace_s: u64,

    /// Size of the in-memory tail ring per execution.
    pub tail_buffer_bytes: usize,

    /// Outputs at or above this size are saved as documents.
    pub output_save_threshold_bytes: usize,
}

impl Default for EmdxConfig {
    fn default() -> Self {
        let config_dir = default_config_dir();
        let state_dir = config_dir.join("state");
        Self {
            db_path: config_dir.join("knowledge.db"),
            log_dir: state_dir.join("executions"),
            config_dir,
            state_dir,
            max_concurrent: 5,
            heartbeat_interval_s: 30,
            liveness_timeout_s: 90,
            execution_timeout_s: 300,
            kill_grace_s: 5,
            tail_buffer_bytes: 65_536,
            output_save_threshold_bytes: 200,
        }
    }
}

impl EmdxConfig {
    /// Loads configuration: defaults, then `<config_dir>/config.toml`, then
    /// `EMDX_*` environment variables.
    ///
    /// `EMDX_CONFIG_DIR` moves the whole anchor directory, which also moves
    /// the default db/state/log paths unless those are set explicitly.
    pub fn load() -> Result<Self> {
        let config_dir = env::var_os("EMDX_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_config_dir);
        Self::load_from(&config_dir)
    }

    /// Loads configuration anchored at an explicit directory.
    pub fn load_from(config_dir: &Path) -> Result<Self> {
        let defaults = Self::anchored_defaults(config_dir);
        let config: Self = Figment::from(Serialized::defaults(defaults))
            .merge(Toml::file(config_dir.join("config.toml")))
            .merge(Env::prefixed("EMDX_").ignore(&["config_dir", "vcs_token"]))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with every path derived from the given anchor directory.
    fn anchored_defaults(config_dir: &Path) -> Self {
        let state_dir = config_dir.join("state");
        Self {
            db_path: config_dir.join("knowledge.db"),
            log_dir: state_dir.join("executions"),
            config_dir: config_dir.to_path_buf(),
            state_dir,
            ..Self::default()
        }
    }

    /// Range checks on the tunables.
    fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 || self.max_concurrent > MAX_CONCURRENT_CAP {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrent",
                reason: format!(
                    "must be between 1 and {MAX_CONCURRENT_CAP} (got {})",
                    self.max_concurrent
                ),
            });
        }
        if self.heartbeat_interval_s == 0 {
            return Err(ConfigError::InvalidValue {
                key: "heartbeat_interval_s",
                reason: "must be at least 1".into(),
            });
        }
        if self.liveness_timeout_s < self.heartbeat_interval_s {
            return Err(ConfigError::InvalidValue {
                key: "liveness_timeout_s",
                reason: format!(
                    "must be at least heartbeat_interval_s ({})",
                    self.heartbeat_interval_s
                ),
            });
        }
        if self.tail_buffer_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "tail_buffer_bytes",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Reads the optional VCS auth token for PR creation.
    ///
    /// Read on demand rather than stored so the secret stays out of every
    /// serialized form of the config.
    pub fn vcs_token() -> Option<String> {
        env::var("EMDX_VCS_TOKEN").ok().filter(|t| !t.is_empty())
    }
}

/// Platform default for the config directory: `~/.config/emdx`.
fn default_config_dir() -> PathBuf {
    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join(DEFAULT_APP_DIR);
    }
    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".config").join(DEFAULT_APP_DIR);
    }
    // Last resort: relative to the working directory.
    PathBuf::from(".").join(format!(".{DEFAULT_APP_DIR}"))
}
