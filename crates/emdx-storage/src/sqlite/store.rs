//! [`SqliteStore`] -- SQLite-backed storage engine.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::sqlite::schema;

/// The SQLite storage engine.
///
/// Wraps a [`rusqlite::Connection`] in a `Mutex`. All public methods acquire
/// the lock, execute SQL, and release it; nothing holds the connection
/// across a blocking wait outside the database itself.
pub struct SqliteStore {
    /// The mutex-protected SQLite connection.
    pub(crate) conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at the given path.
    ///
    /// Creates parent directories, enables WAL and foreign keys, then runs
    /// migrations to head. Fails with [`StorageError::Unavailable`] when the
    /// path cannot be created or opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(?path, "opening SQLite database");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Unavailable(format!(
                    "cannot create {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            StorageError::Unavailable(format!("failed to open {}: {e}", path.display()))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.configure_connection()?;
        store.run_migrations()?;
        Ok(store)
    }

    /// Opens an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        debug!("opening in-memory SQLite database");
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Unavailable(format!("failed to open in-memory db: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.configure_connection()?;
        store.run_migrations()?;
        Ok(store)
    }

    /// Sets connection pragmas (WAL mode, foreign keys, busy timeout).
    fn configure_connection(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| StorageError::Connection(format!("failed to set pragmas: {e}")))?;
        Ok(())
    }

    /// Applies pending migrations in ascending order.
    ///
    /// Each migration runs in its own transaction and is recorded in
    /// `schema_migrations`; a failure aborts open, naming the version.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        conn.execute_batch(schema::SCHEMA_MIGRATIONS_DDL)
            .map_err(|e| StorageError::Corrupt(format!("cannot create schema_migrations: {e}")))?;

        for migration in schema::MIGRATIONS {
            let applied: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
                    rusqlite::params![migration.version],
                    |row| row.get(0),
                )
                .map_err(|e| StorageError::Corrupt(format!("cannot read schema_migrations: {e}")))?;

            if applied {
                debug!(version = migration.version, "migration already applied, skipping");
                continue;
            }

            debug!(
                version = migration.version,
                description = migration.description,
                "applying migration"
            );
            let tx = conn.unchecked_transaction().map_err(|e| {
                StorageError::MigrationFailed {
                    version: migration.version,
                    reason: format!("failed to begin: {e}"),
                }
            })?;

            tx.execute_batch(migration.sql)
                .map_err(|e| StorageError::MigrationFailed {
                    version: migration.version,
                    reason: e.to_string(),
                })?;

            tx.execute(
                "INSERT INTO schema_migrations (version, description) VALUES (?1, ?2)",
                rusqlite::params![migration.version, migration.description],
            )
            .map_err(|e| StorageError::MigrationFailed {
                version: migration.version,
                reason: format!("failed to record: {e}"),
            })?;

            tx.commit().map_err(|e| StorageError::MigrationFailed {
                version: migration.version,
                reason: format!("failed to commit: {e}"),
            })?;
        }

        info!(version = schema::head_version(), "schema at head");
        Ok(())
    }

    /// Returns the highest applied migration version.
    pub fn schema_version(&self) -> Result<i64> {
        let conn = self.lock_conn()?;
        let version: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    /// Acquires the connection lock. Helper used by all operation modules.
    pub(crate) fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Connection(format!("mutex poisoned: {e}")))
    }

    /// Runs a closure inside a database transaction.
    ///
    /// Commits when the closure returns `Ok`; rolls back (on drop) otherwise.
    pub fn run_in_transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StorageError::Transaction(format!("failed to begin: {e}")))?;

        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;
        Ok(value)
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_reaches_head() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), schema::head_version());
    }

    #[test]
    fn migrations_are_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        // Re-running the head set must be a no-op.
        store.run_migrations().unwrap();
        assert_eq!(store.schema_version().unwrap(), schema::head_version());
    }

    #[test]
    fn open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/knowledge.db");
        let store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.schema_version().unwrap(), schema::head_version());
    }

    #[test]
    fn reopen_preserves_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.db");
        {
            SqliteStore::open(&path).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), schema::head_version());
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result: Result<()> = store.run_in_transaction(|conn| {
            conn.execute(
                "INSERT INTO documents (title, content) VALUES ('t', 'c')",
                [],
            )?;
            Err(StorageError::invalid_input("forced rollback"))
        });
        assert!(result.is_err());

        let conn = store.lock_conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
