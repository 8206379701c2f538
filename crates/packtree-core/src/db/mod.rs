//! SQLite project database.
//!
//! Runtime defaults follow the usual single-writer setup:
//! - `journal_mode = WAL` so readers do not block the writer
//! - `busy_timeout = 5s` to ride out short lock contention
//! - `foreign_keys = ON` to keep package references consistent

pub mod migrations;
pub mod query;
pub mod schema;
pub mod snapshot;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

pub use snapshot::{load_warehouse, save_warehouse};

/// Busy timeout used for project database connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File name of the project database inside `.packtree/`.
pub const DB_FILE: &str = "packtree.db";

/// Open (or create) the project database, apply pragmas and migrate the
/// schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening, configuring or migrating the database fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply schema migrations")?;

    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// SQLite integers are signed; ids are allocated from 1 and stay far below
/// `i64::MAX`.
pub(crate) fn to_sql_id(id: u64) -> rusqlite::Result<i64> {
    i64::try_from(id).map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))
}

pub(crate) fn from_sql_id(idx: usize, raw: i64) -> rusqlite::Result<u64> {
    u64::try_from(raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(err))
    })
}
