//! Numbered schema migrations.
//!
//! Migrations are append-only and monotonically numbered; applied versions
//! are recorded in `schema_migrations` and never re-applied. Timestamps are
//! stored as TEXT in ISO 8601 (SQLite has no native datetime type); booleans
//! are INTEGER 0/1; embedding vectors are little-endian f32 BLOBs.

/// One migration step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Monotonic numeric key.
    pub version: i64,
    /// Short human description, recorded alongside the version.
    pub description: &'static str,
    /// The DDL/DML body, applied atomically.
    pub sql: &'static str,
}

/// Bookkeeping table; created unconditionally before migrations run.
pub const SCHEMA_MIGRATIONS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version     INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
"#;

/// The full migration history, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create documents, document_fts, tags, document_tags",
        sql: r#"
        CREATE TABLE documents (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            title        TEXT NOT NULL,
            content      TEXT NOT NULL,
            project      TEXT,
            created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            accessed_at  TEXT,
            access_count INTEGER NOT NULL DEFAULT 0,
            parent_id    INTEGER REFERENCES documents(id),
            deleted_at   TEXT
        );
        CREATE INDEX idx_documents_project ON documents(project);
        CREATE INDEX idx_documents_created_at ON documents(created_at);
        CREATE INDEX idx_documents_deleted_at ON documents(deleted_at);

        CREATE VIRTUAL TABLE document_fts USING fts5(title, content);

        CREATE TABLE tags (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE COLLATE NOCASE,
            usage_count INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE document_tags (
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            tag_id      INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (document_id, tag_id)
        );
        CREATE INDEX idx_document_tags_tag ON document_tags(tag_id);
        "#,
    },
    Migration {
        version: 2,
        description: "create tasks and task_log",
        sql: r#"
        CREATE TABLE tasks (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            title          TEXT NOT NULL,
            description    TEXT,
            status         TEXT NOT NULL DEFAULT 'open',
            source_doc_id  INTEGER REFERENCES documents(id),
            parent_task_id INTEGER REFERENCES tasks(id),
            created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            completed_at   TEXT
        );
        CREATE INDEX idx_tasks_status ON tasks(status);
        CREATE INDEX idx_tasks_created_at ON tasks(created_at);

        CREATE TABLE task_log (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id    INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            kind       TEXT NOT NULL,
            message    TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX idx_task_log_task ON task_log(task_id);
        "#,
    },
    Migration {
        version: 3,
        description: "create executions",
        sql: r#"
        CREATE TABLE executions (
            id             TEXT PRIMARY KEY,
            task           TEXT NOT NULL,
            tool_allowlist TEXT,
            working_dir    TEXT,
            model          TEXT,
            status         TEXT NOT NULL DEFAULT 'pending',
            started_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            completed_at   TEXT,
            exit_code      INTEGER,
            log_path       TEXT NOT NULL,
            stdout_tail    TEXT,
            reason         TEXT
        );
        CREATE INDEX idx_executions_status ON executions(status);
        CREATE INDEX idx_executions_started_at ON executions(started_at);
        "#,
    },
    Migration {
        version: 4,
        description: "add documents.archived_at",
        sql: "ALTER TABLE documents ADD COLUMN archived_at TEXT;",
    },
    Migration {
        version: 5,
        description: "create document_links and document_sources",
        sql: r#"
        CREATE TABLE document_links (
            source_id        INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            target_id        INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            similarity_score REAL NOT NULL,
            method           TEXT NOT NULL,
            created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (source_id, target_id, method)
        );
        CREATE INDEX idx_document_links_target ON document_links(target_id);

        CREATE TABLE document_sources (
            document_id INTEGER PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
            source_kind TEXT NOT NULL,
            source_id   TEXT NOT NULL
        );
        CREATE INDEX idx_document_sources_kind ON document_sources(source_kind);
        "#,
    },
    Migration {
        version: 6,
        description: "add executions.pid and executions.last_heartbeat",
        sql: r#"
        ALTER TABLE executions ADD COLUMN pid INTEGER;
        ALTER TABLE executions ADD COLUMN last_heartbeat TEXT;
        "#,
    },
    Migration {
        version: 7,
        description: "create epics and task_dependencies; link tasks to epics",
        sql: r#"
        CREATE TABLE epics (
            key           TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            category      TEXT NOT NULL,
            status        TEXT NOT NULL DEFAULT 'open',
            status_manual INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE task_dependencies (
            task_id       INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            depends_on_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (task_id, depends_on_id)
        );
        CREATE INDEX idx_task_dependencies_depends_on ON task_dependencies(depends_on_id);

        ALTER TABLE tasks ADD COLUMN epic_key TEXT REFERENCES epics(key);
        ALTER TABLE tasks ADD COLUMN epic_seq INTEGER;
        "#,
    },
    Migration {
        version: 8,
        description: "add tasks.priority and tasks.category",
        sql: r#"
        ALTER TABLE tasks ADD COLUMN priority INTEGER NOT NULL DEFAULT 3;
        ALTER TABLE tasks ADD COLUMN category TEXT;
        "#,
    },
    Migration {
        version: 9,
        description: "create embeddings keyed by document and model",
        sql: r#"
        CREATE TABLE embeddings (
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            model       TEXT NOT NULL,
            dims        INTEGER NOT NULL,
            vector      BLOB NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (document_id, model)
        );
        "#,
    },
    Migration {
        version: 10,
        description: "add execution worktree, PR, and usage columns",
        sql: r#"
        ALTER TABLE executions ADD COLUMN worktree_path TEXT;
        ALTER TABLE executions ADD COLUMN branch TEXT;
        ALTER TABLE executions ADD COLUMN pr_url TEXT;
        ALTER TABLE executions ADD COLUMN tokens_in INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE executions ADD COLUMN tokens_out INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE executions ADD COLUMN cost_usd REAL;
        ALTER TABLE executions ADD COLUMN doc_id_output INTEGER REFERENCES documents(id);
        "#,
    },
];

/// The version the database reaches after all migrations apply.
pub fn head_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_increasing() {
        let mut prev = 0;
        for m in MIGRATIONS {
            assert!(m.version > prev, "migration {} out of order", m.version);
            prev = m.version;
        }
    }

    #[test]
    fn head_is_last() {
        assert_eq!(head_version(), MIGRATIONS.last().unwrap().version);
    }
}
