//! SQLite-backed credential storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::{CredentialStore, Secret, StoreError};
use crate::model::CredentialRecord;

/// Credential store backed by a single-row SQLite table.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE oauth_credentials (
///     id INTEGER PRIMARY KEY CHECK (id = 1),
///     access_token TEXT,
///     refresh_token TEXT,
///     expires_at TEXT,
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```
///
/// The `CHECK (id = 1)` constraint makes the single-tenant invariant part of
/// the schema: a second record cannot be inserted. `save` is one upsert
/// statement, so SQLite's atomicity guarantees a reader sees either the old
/// or the new record, never a mix.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS oauth_credentials (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    access_token TEXT,
    refresh_token TEXT,
    expires_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

impl SqliteStore {
    /// Open or create the database at `path`.
    ///
    /// Parent directories are created if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, StoreError> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT access_token, refresh_token, expires_at, created_at, updated_at
                 FROM oauth_credentials WHERE id = 1",
                [],
                |row| {
                    Ok(CredentialRecord {
                        access_token: row.get::<_, Option<String>>(0)?.map(Secret::new),
                        refresh_token: row.get::<_, Option<String>>(1)?.map(Secret::new),
                        expires_at: row.get::<_, Option<DateTime<Utc>>>(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    async fn save(
        &self,
        access_token: &Secret,
        refresh_token: &Secret,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        self.conn.lock().execute(
            r#"
            INSERT INTO oauth_credentials (
                id, access_token, refresh_token, expires_at, created_at, updated_at
            )
            VALUES (1, ?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
            params![access_token.expose(), refresh_token.expose(), expires_at, now],
        )?;

        tracing::debug!("Persisted credential record (expires at {})", expires_at);
        Ok(())
    }
}
