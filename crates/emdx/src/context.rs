//! Runtime context for command execution.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::{DateTime, NaiveDate, Utc};

use emdx_config::EmdxConfig;
use emdx_core::filter::DocumentFilter;
use emdx_storage::SqliteStore;

use crate::cli::{FilterArgs, GlobalArgs};

/// Runtime context passed to every command handler.
///
/// Constructed once in `main` after CLI parsing, before dispatch. There is
/// no global state; everything a handler needs hangs off this value.
pub struct RuntimeContext {
    pub config: EmdxConfig,
    pub json: bool,
    pub verbose: bool,
    pub quiet: bool,
    db_override: Option<std::path::PathBuf>,
}

impl RuntimeContext {
    /// Builds the context from parsed global arguments.
    pub fn from_global_args(global: &GlobalArgs) -> Result<Self> {
        let config = match global.config_dir {
            Some(ref dir) => EmdxConfig::load_from(dir),
            None => EmdxConfig::load(),
        }
        .context("failed to load configuration")?;

        Ok(Self {
            config,
            json: global.json,
            verbose: global.verbose,
            quiet: global.quiet,
            db_override: global.db.clone(),
        })
    }

    /// Opens the store, running migrations to head.
    pub fn open_store(&self) -> Result<Arc<SqliteStore>> {
        let path = self
            .db_override
            .clone()
            .unwrap_or_else(|| self.config.db_path.clone());
        let store =
            SqliteStore::open(&path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Arc::new(store))
    }

    /// Builds a document filter from the shared flag set.
    pub fn document_filter(&self, args: &FilterArgs) -> Result<DocumentFilter> {
        Ok(DocumentFilter {
            project: args.project.clone(),
            tags_all: args.tags.clone(),
            tags_any: args.tags_any.clone(),
            created_after: args.created_after.as_deref().map(parse_date).transpose()?,
            created_before: args.created_before.as_deref().map(parse_date).transpose()?,
            modified_after: args.modified_after.as_deref().map(parse_date).transpose()?,
            modified_before: args
                .modified_before
                .as_deref()
                .map(parse_date)
                .transpose()?,
            include_archived: args.include_archived,
            include_deleted: false,
            parent_id: None,
            limit: Some(args.limit),
        })
    }
}

/// Parses an ISO date (`2026-07-01`) or RFC 3339 datetime.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("cannot parse date '{s}' (expected YYYY-MM-DD or RFC 3339)"))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc())
}
