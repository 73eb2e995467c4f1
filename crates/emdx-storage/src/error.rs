//! Storage error types.

use emdx_core::validation::ValidationError;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A caller-supplied value violated an input policy.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the violated policy.
        message: String,
    },

    /// The requested entity was not found among live rows.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g., "document", "task").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The operation is not legal in the entity's current state.
    #[error("conflicting state: {message}")]
    ConflictState {
        /// Description of the disallowed transition.
        message: String,
    },

    /// The database file could not be opened or created.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The database file exists but is not usable.
    #[error("storage corrupt: {0}")]
    Corrupt(String),

    /// A schema migration failed.
    #[error("migration {version} failed: {reason}")]
    MigrationFailed {
        /// The numeric key of the failing migration.
        version: i64,
        /// Underlying error description.
        reason: String,
    },

    /// Failed to establish or maintain a database connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// A transaction operation failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A raw SQLite query error.
    #[error("query error: {0}")]
    Query(#[from] rusqlite::Error),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the storage crate.
pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    // -- Constructors --------------------------------------------------------

    /// Creates a [`StorageError::NotFound`] for the given entity kind and id.
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a [`StorageError::InvalidInput`] with the given message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a [`StorageError::ConflictState`] with the given message.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::ConflictState {
            message: message.into(),
        }
    }

    // -- Predicates ----------------------------------------------------------

    /// Returns `true` if this is a [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the caller supplied bad input (exit code 2 at the
    /// CLI boundary).
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}

impl From<ValidationError> for StorageError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidInput {
            message: err.to_string(),
        }
    }
}

impl From<emdx_core::enums::UnknownVariant> for StorageError {
    fn from(err: emdx_core::enums::UnknownVariant) -> Self {
        Self::InvalidInput {
            message: err.to_string(),
        }
    }
}
