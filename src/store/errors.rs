use std::path::PathBuf;

use thiserror::Error;

/// Errors that can arise inside the graveyard store. They never cross the
/// public store API: each operation logs them and returns an empty result.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around rusqlite's error type.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper around IO errors (directory creation, lock file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Another process already holds the store open for writing.
    #[error("store {0} is locked by another process")]
    Locked(PathBuf),

    /// Rewriting a table's structure failed; the schema version was not advanced.
    #[error("migration of table {table} failed: {source}")]
    Migration {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The file was written by a newer release.
    #[error("schema version {found} is newer than supported version {supported}")]
    FutureSchema { found: i32, supported: i32 },
}

impl StoreError {
    /// True for UNIQUE / PRIMARY KEY violations.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}
