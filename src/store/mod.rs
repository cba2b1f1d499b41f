//! SQLite-backed metadata store.
//!
//! Persists projects, entities, fields and explicit entity relationships.
//! The store is a thin layer over a [`Database`] handle: every operation is a
//! short sequence of parameterized statements and there is no caching.
//!
//! # Contracts
//!
//! - `create_*(id, data)` takes a caller-supplied id and returns the persisted
//!   record. Id uniqueness is enforced by SQLite.
//! - `update_*(id, patch)` applies only the attributes present in the patch.
//!   An empty patch returns the current record without writing. An unknown id
//!   yields `Ok(None)`.
//! - `delete_*(id)` returns whether a row was removed.
//!
//! Cross-record invariants (PK/FK exclusivity, dangling references, duplicate
//! relationship tuples) are checked by [`crate::validation`] before the store
//! is called. Constraint violations raised by SQLite itself are surfaced as
//! [`StoreError::Constraint`] with the original error untouched.

mod database;
mod entities;
mod fields;
mod patch;
mod projects;
mod relationships;
mod types;

pub use database::Database;
pub use types::*;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite rejected a write because of a uniqueness, foreign-key or check
    /// constraint.
    #[error("Storage constraint violation: {0}")]
    Constraint(#[source] rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to determine data directory")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error is a storage-level constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::Constraint(err),
            _ => Self::Sqlite(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// CRUD access to metadata records.
///
/// Borrows the connection of a [`Database`]; it is cheap to copy and holds no
/// state of its own.
#[derive(Clone, Copy)]
pub struct MetadataStore<'a> {
    conn: &'a Connection,
}

impl<'a> MetadataStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { conn: db.conn() }
    }

    pub(crate) fn conn(&self) -> &'a Connection {
        self.conn
    }
}

/// Current time for `created_at`/`updated_at` stamps.
fn now() -> DateTime<Utc> {
    Utc::now()
}

/// A fresh record id (random UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
