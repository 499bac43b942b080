// src/db/mod.rs

//! SQLite-backed persistence for the catalog.
//!
//! All state lives in one database file: releases and their variant/arch
//! topology, imported compose snapshots, RPM records, override rows and the
//! change audit log.

pub mod models;
pub mod schema;

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Open an existing database, enabling foreign key enforcement
pub fn open(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(conn)
}

/// Open a database and bring its schema up to date
///
/// Missing parent directories are created.
pub fn init(path: &str) -> Result<Connection> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = open(path)?;
    schema::migrate(&conn)?;
    info!("Database ready at {}", path);
    Ok(conn)
}

/// Run a closure inside one transaction
///
/// The transaction commits when the closure returns Ok and rolls back on
/// error, so one logical request either applies completely or not at all.
pub fn transaction<T>(
    conn: &mut Connection,
    f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
) -> Result<T> {
    let tx = conn.transaction()?;
    let result = f(&tx)?;
    tx.commit()?;
    Ok(result)
}
