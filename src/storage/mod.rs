//! SQLite persistence for parts and part types.

mod migrations;
pub mod part_types;
pub mod parts;

pub use part_types::PartTypeRepository;
pub use parts::PartRepository;

use crate::models::ValidationError;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_millis(2000);
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Invalid(#[from] ValidationError),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("database migration failed: {0}")]
    Migration(String),

    #[error("database task failed: {0}")]
    Task(String),
}

impl StorageError {
    /// Unique constraint failures become `Conflict` with the given message
    fn from_write(err: rusqlite::Error, conflict: impl FnOnce() -> String) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::Conflict(conflict())
            }
            _ => StorageError::Sqlite(err),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Clone)]
pub struct Db {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("max_size", &self.pool.max_size())
            .finish()
    }
}

impl Db {
    /// Open (creating if needed) the database file, migrate it and seed part types
    pub fn open(path: &Path, pool_size: u32) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Migration(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            configure_connection(conn)
        });

        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .build(manager)?;

        let mut conn = pool.get()?;
        migrations::apply_migrations(&mut conn)?;
        let seeded = part_types::seed_defaults(&conn)?;
        if seeded > 0 {
            info!(seeded, "seeded default part types");
        }

        info!(path = %path.display(), pool_size, "sqlite database ready");
        Ok(Db { pool })
    }

    pub fn open_connection(&self) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
"#,
    )
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
