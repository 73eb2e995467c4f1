//! SQLite-backed storage engine for the emdx knowledge base.
//!
//! All persistence goes through [`SqliteStore`]: documents with their
//! full-text mirror, tags, tasks, epics, dependencies, executions, links,
//! provenance, and embeddings. Connections run with WAL, foreign keys, and
//! a busy timeout; schema changes go through numbered migrations recorded
//! in `schema_migrations`.

pub mod error;
pub mod sqlite;

pub use error::{Result, StorageError};
pub use sqlite::documents::{DocumentUpdates, SaveOptions};
pub use sqlite::search::{sanitize_fts5_query, KeywordHit};
pub use sqlite::store::SqliteStore;
