// src/db/models.rs

//! Data models for Beacon database records
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading and updating records.

use crate::error::{Error, Result};
use crate::packages::SnapshotPackage;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

/// Current time as an RFC 3339 timestamp with millisecond precision
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Offset for a 1-based page
fn page_offset(page: u32, limit: u32) -> i64 {
    i64::from(page.max(1) - 1) * i64::from(limit)
}

/// Map a unique-index violation to `Error::Duplicate`
fn map_duplicate(err: rusqlite::Error, what: String) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Duplicate(what)
        }
        _ => Error::Database(err),
    }
}

/// Strip quotes and surrounding whitespace from a wallet address
pub fn normalize_address(address: &str) -> String {
    address.replace('"', "").trim().to_string()
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// A published snapshot, one per upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub wallet_address: String,
    pub blob_id: String,
    pub project_name: Option<String>,
    pub created_at: Option<String>,
}

const PUSH_RECORD_COLUMNS: &str = "id, wallet_address, blob_id, project_name, created_at";

impl PushRecord {
    pub fn new(wallet_address: String, blob_id: String, project_name: Option<String>) -> Self {
        Self {
            id: None,
            wallet_address,
            blob_id,
            project_name,
            created_at: None,
        }
    }

    /// Insert this record; a blob id recorded twice is `Error::Duplicate`
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let created_at = self.created_at.clone().unwrap_or_else(now_timestamp);
        conn.execute(
            "INSERT INTO push_records (wallet_address, blob_id, project_name, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![&self.wallet_address, &self.blob_id, &self.project_name, &created_at],
        )
        .map_err(|e| map_duplicate(e, format!("blob {}", self.blob_id)))?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        self.created_at = Some(created_at);
        Ok(id)
    }

    pub fn find_by_blob_id(conn: &Connection, blob_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM push_records WHERE blob_id = ?1",
            PUSH_RECORD_COLUMNS
        ))?;
        Ok(stmt.query_row([blob_id], Self::from_row).optional()?)
    }

    /// All records of a wallet, newest first
    pub fn list_by_wallet(conn: &Connection, wallet: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM push_records WHERE wallet_address = ?1
             ORDER BY created_at DESC, id DESC",
            PUSH_RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map([wallet], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// One page (1-based) of a wallet's records, newest first
    pub fn list_by_wallet_paginated(
        conn: &Connection,
        wallet: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM push_records WHERE wallet_address = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            PUSH_RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(
                params![wallet, i64::from(limit), page_offset(page, limit)],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Change the project name of an existing record
    pub fn update_project_name(
        conn: &Connection,
        blob_id: &str,
        project_name: Option<&str>,
    ) -> Result<Option<Self>> {
        let changed = conn.execute(
            "UPDATE push_records SET project_name = ?1 WHERE blob_id = ?2",
            params![project_name, blob_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Self::find_by_blob_id(conn, blob_id)
    }

    pub fn count_by_wallet(conn: &Connection, wallet: &str) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM push_records WHERE wallet_address = ?1",
            [wallet],
            |row| row.get(0),
        )?)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            wallet_address: row.get(1)?,
            blob_id: row.get(2)?,
            project_name: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

/// One package of a published snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub wallet_address: String,
    pub blob_id: String,
    pub package: SnapshotPackage,
    pub metadata: serde_json::Value,
}

const PACKAGE_RECORD_COLUMNS: &str = "id, wallet_address, blob_id, name, version, metadata";

impl PackageRecord {
    pub fn new(
        wallet_address: String,
        blob_id: String,
        package: SnapshotPackage,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: None,
            wallet_address,
            blob_id,
            package,
            metadata,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO package_records (wallet_address, blob_id, name, version, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.wallet_address,
                &self.blob_id,
                &self.package.name,
                &self.package.version,
                serde_json::to_string(&self.metadata)?,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Packages of one snapshot, in insertion order
    pub fn find_by_blob_id(conn: &Connection, blob_id: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM package_records WHERE blob_id = ?1 ORDER BY id",
            PACKAGE_RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map([blob_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn count_by_wallet(conn: &Connection, wallet: &str) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM package_records WHERE wallet_address = ?1",
            [wallet],
            |row| row.get(0),
        )?)
    }

    pub fn count_by_blob_id(conn: &Connection, blob_id: &str) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM package_records WHERE blob_id = ?1",
            [blob_id],
            |row| row.get(0),
        )?)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let metadata: Option<String> = row.get(5)?;
        let metadata = match metadata {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })?,
            None => serde_json::Value::Null,
        };

        Ok(Self {
            id: Some(row.get(0)?),
            wallet_address: row.get(1)?,
            blob_id: row.get(2)?,
            package: SnapshotPackage::new(row.get::<_, String>(3)?, row.get::<_, String>(4)?),
            metadata,
        })
    }
}

/// Append-only publish log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushHistory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub wallet_address: String,
    pub blob_id: String,
    pub package_count: i64,
    pub source: Option<String>,
    pub created_at: Option<String>,
}

impl PushHistory {
    pub fn new(wallet_address: String, blob_id: String, package_count: i64, source: Option<String>) -> Self {
        Self {
            id: None,
            wallet_address,
            blob_id,
            package_count,
            source,
            created_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let created_at = self.created_at.clone().unwrap_or_else(now_timestamp);
        conn.execute(
            "INSERT INTO push_history (wallet_address, blob_id, package_count, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.wallet_address,
                &self.blob_id,
                self.package_count,
                &self.source,
                &created_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        self.created_at = Some(created_at);
        Ok(id)
    }

    /// Publish history of a wallet, newest first
    pub fn list_by_wallet(conn: &Connection, wallet: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, wallet_address, blob_id, package_count, source, created_at
             FROM push_history WHERE wallet_address = ?1 ORDER BY created_at DESC, id DESC",
        )?;

        let history = stmt
            .query_map([wallet], |row| {
                Ok(Self {
                    id: Some(row.get(0)?),
                    wallet_address: row.get(1)?,
                    blob_id: row.get(2)?,
                    package_count: row.get(3)?,
                    source: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(history)
    }
}

/// A package in a user's synced set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPackage {
    pub name: String,
    pub version: String,
    pub install_date: String,
    pub last_updated: String,
}

/// Last synced package set of a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub wallet_address: String,
    pub packages: Vec<UserPackage>,
    pub created_at: String,
}

impl UserRecord {
    pub fn find_by_wallet(conn: &Connection, wallet: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, wallet_address, packages, created_at FROM users WHERE wallet_address = ?1",
        )?;
        Ok(stmt.query_row([wallet], Self::from_row).optional()?)
    }

    /// Replace the package set of a wallet, creating the user if needed
    pub fn upsert_packages(conn: &Connection, wallet: &str, packages: &[UserPackage]) -> Result<Self> {
        conn.execute(
            "INSERT INTO users (wallet_address, packages, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(wallet_address) DO UPDATE SET packages = excluded.packages",
            params![wallet, serde_json::to_string(packages)?, now_timestamp()],
        )?;

        Self::find_by_wallet(conn, wallet)?
            .ok_or_else(|| Error::NotFound(format!("user {}", wallet)))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            wallet_address: row.get(1)?,
            packages: json_column(row, 2)?,
            created_at: row.get(3)?,
        })
    }
}

/// An uploaded achievement image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_address: String,
    pub blob_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: String,
    pub status: bool,
    pub created_at: Option<String>,
}

const ACHIEVEMENT_COLUMNS: &str =
    "id, user_address, blob_id, title, description, image, status, created_at";

impl AchievementRecord {
    pub fn new(
        user_address: &str,
        blob_id: String,
        title: Option<String>,
        description: Option<String>,
    ) -> Self {
        let image = format!("/v1/achievements/image/{}", blob_id);
        Self {
            id: None,
            user_address: normalize_address(user_address),
            blob_id,
            title,
            description,
            image,
            status: false,
            created_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let created_at = self.created_at.clone().unwrap_or_else(now_timestamp);
        conn.execute(
            "INSERT INTO achievements (user_address, blob_id, title, description, image, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &self.user_address,
                &self.blob_id,
                &self.title,
                &self.description,
                &self.image,
                self.status,
                &created_at,
            ],
        )
        .map_err(|e| map_duplicate(e, format!("achievement {}", self.blob_id)))?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        self.created_at = Some(created_at);
        Ok(id)
    }

    pub fn find_by_blob_id(conn: &Connection, blob_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM achievements WHERE blob_id = ?1",
            ACHIEVEMENT_COLUMNS
        ))?;
        Ok(stmt.query_row([blob_id], Self::from_row).optional()?)
    }

    /// One page (1-based) of a user's achievements, newest first
    pub fn list_by_user_paginated(
        conn: &Connection,
        user_address: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM achievements WHERE user_address = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            ACHIEVEMENT_COLUMNS
        ))?;

        let records = stmt
            .query_map(
                params![
                    normalize_address(user_address),
                    i64::from(limit),
                    page_offset(page, limit)
                ],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn count_by_user(conn: &Connection, user_address: &str) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM achievements WHERE user_address = ?1",
            [normalize_address(user_address)],
            |row| row.get(0),
        )?)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            user_address: row.get(1)?,
            blob_id: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            image: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
