// src/db/queries.rs

//! Per-wallet aggregates over the publish tables
//!
//! Nothing here is materialized; every call scans the underlying rows.

use super::models::{PackageRecord, PushRecord};
use crate::error::Result;
use rusqlite::{Connection, params};
use serde::Serialize;

/// A push record together with the number of packages it published
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRecordSummary {
    #[serde(flatten)]
    pub record: PushRecord,
    pub package_count: i64,
}

/// A push record and its package rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotDetail {
    #[serde(flatten)]
    pub record: PushRecord,
    pub packages: Vec<PackageRecord>,
}

/// Dashboard totals for one wallet
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub total_projects: i64,
    pub total_packages: i64,
    pub projects: Vec<PushRecordSummary>,
}

/// Page metadata returned next to paginated lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit = limit.max(1);
        Self {
            page: page.max(1),
            limit,
            total,
            total_pages: (total + i64::from(limit) - 1) / i64::from(limit),
        }
    }
}

/// Distinct project names a wallet has published under
pub fn count_unique_projects(conn: &Connection, wallet: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(DISTINCT project_name) FROM push_records WHERE wallet_address = ?1",
        [wallet],
        |row| row.get(0),
    )?)
}

/// Package rows across all of a wallet's snapshots
pub fn count_total_packages(conn: &Connection, wallet: &str) -> Result<i64> {
    PackageRecord::count_by_wallet(conn, wallet)
}

/// All push records of a wallet, newest first, with per-snapshot package counts
pub fn push_records_with_package_counts(
    conn: &Connection,
    wallet: &str,
) -> Result<Vec<PushRecordSummary>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.wallet_address, r.blob_id, r.project_name, r.created_at,
                (SELECT COUNT(*) FROM package_records p WHERE p.blob_id = r.blob_id)
         FROM push_records r
         WHERE r.wallet_address = ?1
         ORDER BY r.created_at DESC, r.id DESC",
    )?;

    let rows = stmt
        .query_map(params![wallet], |row| {
            Ok(PushRecordSummary {
                record: PushRecord {
                    id: Some(row.get(0)?),
                    wallet_address: row.get(1)?,
                    blob_id: row.get(2)?,
                    project_name: row.get(3)?,
                    created_at: row.get(4)?,
                },
                package_count: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A snapshot with its packages, `None` when the blob id is unknown
pub fn push_record_with_packages(conn: &Connection, blob_id: &str) -> Result<Option<SnapshotDetail>> {
    let Some(record) = PushRecord::find_by_blob_id(conn, blob_id)? else {
        return Ok(None);
    };
    let packages = PackageRecord::find_by_blob_id(conn, blob_id)?;
    Ok(Some(SnapshotDetail { record, packages }))
}

/// One page of a wallet's snapshots with their packages, newest first
pub fn snapshots_page(conn: &Connection, wallet: &str, page: u32, limit: u32) -> Result<Vec<SnapshotDetail>> {
    PushRecord::list_by_wallet_paginated(conn, wallet, page, limit)?
        .into_iter()
        .map(|record| {
            let packages = PackageRecord::find_by_blob_id(conn, &record.blob_id)?;
            Ok(SnapshotDetail { record, packages })
        })
        .collect()
}

pub fn summary(conn: &Connection, wallet: &str) -> Result<WalletSummary> {
    Ok(WalletSummary {
        total_projects: count_unique_projects(conn, wallet)?,
        total_packages: count_total_packages(conn, wallet)?,
        projects: push_records_with_package_counts(conn, wallet)?,
    })
}
