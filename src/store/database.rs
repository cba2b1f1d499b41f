//! The storage handle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use super::{MetadataStore, StoreError, StoreResult};
use crate::config::DatabaseSettings;

/// An open metadata database.
///
/// This is the single owner of the SQLite connection. Components borrow it;
/// nothing holds it globally. Call [`Database::close`] to tear it down and
/// observe close errors, or drop it.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create a database file.
    ///
    /// Parent directories are created as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::open_file(path.as_ref(), DatabaseSettings::default().busy_timeout())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn, DatabaseSettings::default().busy_timeout(), false)?;
        Ok(Self { conn, path: None })
    }

    /// Open the database described by settings.
    ///
    /// A path of `:memory:` opens an in-memory database; no path opens the
    /// default location (see [`Database::default_path`]).
    pub fn open_with(settings: &DatabaseSettings) -> StoreResult<Self> {
        match settings.path.as_deref() {
            Some(":memory:") => {
                let conn = Connection::open_in_memory()?;
                Self::configure(&conn, settings.busy_timeout(), false)?;
                Ok(Self { conn, path: None })
            }
            Some(path) => Self::open_file(Path::new(path), settings.busy_timeout()),
            None => Self::open_file(&Self::default_path()?, settings.busy_timeout()),
        }
    }

    /// Default database location: `<data dir>/strata/strata.db`.
    pub fn default_path() -> StoreResult<PathBuf> {
        let base = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(base.join("strata").join("strata.db"))
    }

    fn open_file(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure(&conn, busy_timeout, true)?;
        debug!(path = %path.display(), "opened metadata database");

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    fn configure(conn: &Connection, busy_timeout: Duration, wal: bool) -> StoreResult<()> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        Ok(())
    }

    /// Path of the database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Borrow the metadata store.
    pub fn store(&self) -> MetadataStore<'_> {
        MetadataStore::new(self)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Rows inserted, updated or deleted through this handle since it was
    /// opened.
    pub fn total_changes(&self) -> StoreResult<i64> {
        let changes = self
            .conn
            .query_row("SELECT total_changes()", [], |row| row.get(0))?;
        Ok(changes)
    }

    /// SQLite's schema cookie, bumped on every DDL change.
    pub fn schema_version(&self) -> StoreResult<i64> {
        let version = self
            .conn
            .query_row("PRAGMA schema_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Close the database, reporting any error SQLite raises while closing.
    pub fn close(self) -> StoreResult<()> {
        self.conn.close().map_err(|(_, err)| StoreError::from(err))
    }
}
