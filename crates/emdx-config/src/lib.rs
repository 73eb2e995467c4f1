//! Configuration loading for the emdx system.
//!
//! The main entry point is [`EmdxConfig`], loaded with [`EmdxConfig::load`]:
//! built-in defaults, then `<config_dir>/config.toml`, then `EMDX_*`
//! environment variables, each layer overriding the last. There are no
//! global singletons; the loaded value is passed explicitly at system init.

mod config;

pub use config::{ConfigError, EmdxConfig, Result, DEFAULT_APP_DIR};
