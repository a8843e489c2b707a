// src/db/mod.rs

//! Database layer for Beacon
//!
//! This module handles all SQLite operations including:
//! - Resolving `DATABASE_URL` to a database file
//! - Database initialization and schema migration
//! - Connection management, including the shared handle used by the server
//! - Record models and per-wallet aggregate queries

pub mod models;
pub mod queries;
pub mod schema;

use crate::error::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// In-memory database location
pub const MEMORY_URL: &str = ":memory:";

/// Turn a `DATABASE_URL` into a SQLite path
///
/// Accepts plain paths and the `sqlite://`, `sqlite:` and `file:` prefixes.
pub fn database_path(url: &str) -> Result<String> {
    let url = url.trim();
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .or_else(|| url.strip_prefix("file:"))
        .unwrap_or(url);

    if path.is_empty() {
        return Err(Error::Config("DATABASE_URL is empty".to_string()));
    }
    Ok(path.to_string())
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;
    Ok(())
}

/// Open (creating if needed) and migrate the database at `url`
///
/// This is idempotent - calling it on an existing database is safe.
pub fn init(url: &str) -> Result<Connection> {
    let db_path = database_path(url)?;
    debug!("Initializing database at: {}", db_path);

    if db_path == MEMORY_URL {
        let conn = Connection::open_in_memory()?;
        apply_pragmas(&conn)?;
        schema::migrate(&conn)?;
        return Ok(conn);
    }

    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(&db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::Config(format!("Failed to create database directory: {}", e))
        })?;
    }

    let conn = Connection::open(&db_path)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;
    apply_pragmas(&conn)?;
    schema::migrate(&conn)?;

    info!("Database ready at {}", db_path);
    Ok(conn)
}

/// Open an existing Beacon database
pub fn open(url: &str) -> Result<Connection> {
    let db_path = database_path(url)?;
    if db_path != MEMORY_URL && !Path::new(&db_path).exists() {
        return Err(Error::NotFound(format!("database {}", db_path)));
    }
    if db_path == MEMORY_URL {
        return init(url);
    }

    let conn = Connection::open(&db_path)?;
    apply_pragmas(&conn)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

/// Connection shared across request handlers
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Initialize the database at `url` and wrap it
    pub fn connect(url: &str) -> Result<Self> {
        Ok(Self::new(init(url)?))
    }

    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run `f` with exclusive access to the connection
    pub fn with<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction, committing only if it succeeds
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
