// src/db/schema.rs

//! Database schema definitions and migrations for Beacon
//!
//! This module defines the SQLite schema for all tables and provides
//! a migration system to evolve the schema over time.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::Config(format!("Unknown migration version: {}", version))),
    }
}

/// Initial schema - Version 1
///
/// Creates the publish tables:
/// - push_records: one row per published snapshot, keyed by blob id
/// - package_records: one row per package per published snapshot
/// - push_history: append-only publish log
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE push_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wallet_address TEXT NOT NULL,
            blob_id TEXT NOT NULL,
            project_name TEXT,
            created_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX idx_push_records_blob_id ON push_records(blob_id);
        CREATE INDEX idx_push_records_wallet ON push_records(wallet_address);
        CREATE INDEX idx_push_records_created_at ON push_records(created_at);

        CREATE TABLE package_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wallet_address TEXT NOT NULL,
            blob_id TEXT NOT NULL,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            metadata TEXT
        );

        CREATE INDEX idx_package_records_wallet ON package_records(wallet_address);
        CREATE INDEX idx_package_records_blob_id ON package_records(blob_id);

        CREATE TABLE push_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wallet_address TEXT NOT NULL,
            blob_id TEXT NOT NULL,
            package_count INTEGER NOT NULL,
            source TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX idx_push_history_wallet ON push_history(wallet_address);
        CREATE INDEX idx_push_history_created_at ON push_history(created_at);
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Schema Version 2: users and achievements
///
/// - users: last synced package set per wallet (packages stored as JSON)
/// - achievements: uploaded achievement images, keyed by blob id
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wallet_address TEXT NOT NULL UNIQUE,
            packages TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );

        CREATE TABLE achievements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_address TEXT NOT NULL,
            blob_id TEXT NOT NULL,
            title TEXT,
            description TEXT,
            image TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX idx_achievements_blob_id ON achievements(blob_id);
        CREATE INDEX idx_achievements_user ON achievements(user_address);
        CREATE INDEX idx_achievements_created_at ON achievements(created_at);
        ",
    )?;

    info!("Schema version 2 applied successfully");
    Ok(())
}
