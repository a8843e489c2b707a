// src/snapshot.rs

//! Publishing and pulling package snapshots
//!
//! A snapshot is the JSON list of installed packages uploaded to the blob
//! network. Publishing records the upload in three tables (push record,
//! one package record per package, push history). A failed write is
//! reported as a warning and never undoes the upload or the other writes.
//! The package records of a blob are written all at once or not at all, and
//! a blob that is already recorded gets no further rows.

use crate::blob::{BlobPayload, BlobService};
use crate::db::Database;
use crate::db::models::{PackageRecord, PushHistory, PushRecord, UserPackage, UserRecord, now_timestamp};
use crate::error::{Error, Result};
use crate::nix::{CommandRunner, NixClient};
use crate::packages::{PackageInfo, SnapshotPackage};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Source tag for snapshots published from the command line
pub const SOURCE_CLI: &str = "beacon-cli";

/// Source tag for snapshots published through the API
pub const SOURCE_API: &str = "beacon-api";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub total_count: usize,
    pub timestamp: String,
    pub source: String,
}

/// Document uploaded by a publish and read back by a pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub packages: Vec<SnapshotPackage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SnapshotMetadata>,
}

impl SnapshotPayload {
    /// Build a payload from installed packages; an empty list is rejected
    pub fn new(installed: &[PackageInfo], project_name: Option<&str>, source: &str) -> Result<Self> {
        if installed.is_empty() {
            return Err(Error::Validation("No packages found to push".to_string()));
        }

        let packages: Vec<SnapshotPackage> = installed.iter().map(SnapshotPackage::from).collect();
        Ok(Self {
            project_name: project_name
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            metadata: Some(SnapshotMetadata {
                total_count: packages.len(),
                timestamp: now_timestamp(),
                source: source.to_string(),
            }),
            packages,
        })
    }

    fn description(&self) -> String {
        match &self.project_name {
            Some(project) => format!("Complete package list for project: {}", project),
            None => "Complete package list".to_string(),
        }
    }

    fn source(&self) -> Option<String> {
        self.metadata.as_ref().map(|m| m.source.clone())
    }
}

/// Outcome of a publish
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub blob_id: String,
    pub payload: SnapshotPayload,
    /// Database writes that failed after the upload succeeded
    pub warnings: Vec<String>,
}

/// Upload the installed package list of this host and record it for `wallet`
pub fn publish<R: CommandRunner>(
    nix: &NixClient<R>,
    blobs: &BlobService,
    db: &Database,
    wallet: &str,
    project_name: Option<&str>,
    source: &str,
) -> Result<PublishReport> {
    let wallet = wallet.trim();
    if wallet.is_empty() {
        return Err(Error::Validation("wallet address is required".to_string()));
    }

    let installed = nix.list_installed()?;
    let payload = SnapshotPayload::new(&installed, project_name, source)?;

    let blob_id = blobs.upload_blob(BlobPayload::json(&payload)?, Some(&payload.description()))?;
    let warnings = record_snapshot(db, wallet, &blob_id, &payload);

    info!(
        "Published {} packages for {} as blob {}",
        payload.packages.len(),
        wallet,
        blob_id
    );
    Ok(PublishReport {
        blob_id,
        payload,
        warnings,
    })
}

/// Write the push record, package records and history entry for an upload
///
/// Returns one warning per failed write. A blob that was already recorded
/// keeps its original rows and nothing more is written for it.
pub fn record_snapshot(db: &Database, wallet: &str, blob_id: &str, payload: &SnapshotPayload) -> Vec<String> {
    let mut warnings = Vec::new();

    let mut record = PushRecord::new(wallet.to_string(), blob_id.to_string(), payload.project_name.clone());
    match db.with(|conn| record.insert(conn)) {
        Ok(_) => debug!("Saved push record for {}", blob_id),
        Err(Error::Duplicate(_)) => {
            warn!("Blob {} was already recorded", blob_id);
            warnings.push(format!("blob {} was already recorded", blob_id));
            return warnings;
        }
        Err(e) => {
            warn!("Failed to save push record: {}", e);
            warnings.push(format!("push record: {}", e));
        }
    }

    let metadata = json!({
        "source": payload.source(),
        "projectName": payload.project_name,
    });
    let saved = db.transaction(|tx| {
        for package in &payload.packages {
            PackageRecord::new(wallet.to_string(), blob_id.to_string(), package.clone(), metadata.clone())
                .insert(tx)?;
        }
        Ok(())
    });
    match saved {
        Ok(()) => debug!("Saved {} package records", payload.packages.len()),
        Err(e) => {
            warn!("Failed to save package records: {}", e);
            warnings.push(format!("package records: {}", e));
        }
    }

    let mut history = PushHistory::new(
        wallet.to_string(),
        blob_id.to_string(),
        payload.packages.len() as i64,
        payload.source(),
    );
    if let Err(e) = db.with(|conn| history.insert(conn)) {
        warn!("Failed to save push history: {}", e);
        warnings.push(format!("push history: {}", e));
    }

    warnings
}

/// Blob id referenced by a share URL (its last path segment)
pub fn blob_id_from_url(url: &str) -> Result<String> {
    let id = url
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if id.is_empty() {
        return Err(Error::Validation(format!("no blob id in '{}'", url)));
    }
    Ok(id.to_string())
}

/// Parse downloaded snapshot text
pub fn parse_payload(text: &str) -> Result<SnapshotPayload> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::Parse(format!("snapshot is not JSON: {}", e)))?;

    if !value.get("packages").is_some_and(Value::is_array) {
        return Err(Error::Parse(
            "invalid package list format, expected a 'packages' array".to_string(),
        ));
    }

    let payload: SnapshotPayload = serde_json::from_value(value)
        .map_err(|e| Error::Parse(format!("invalid snapshot: {}", e)))?;
    if payload.packages.is_empty() {
        return Err(Error::Validation("No packages found in the blob".to_string()));
    }
    Ok(payload)
}

/// Download and parse the snapshot behind a share URL
pub fn fetch_snapshot(blobs: &BlobService, url: &str) -> Result<(String, SnapshotPayload)> {
    let blob_id = blob_id_from_url(url)?;
    let text = blobs.read_blob_as_text(&blob_id, None)?;
    Ok((blob_id, parse_payload(&text)?))
}

/// Result of installing a pulled snapshot
#[derive(Debug, Clone, Default)]
pub struct PullSummary {
    pub project_name: Option<String>,
    pub installed: Vec<PackageInfo>,
    /// `(package, reason)` for every failed install
    pub failed: Vec<(String, String)>,
}

/// Install every package of a snapshot, continuing past failures
///
/// `on_package` is called with the 1-based position before each install.
pub fn install_snapshot<R: CommandRunner>(
    nix: &NixClient<R>,
    payload: &SnapshotPayload,
    mut on_package: impl FnMut(usize, &SnapshotPackage),
) -> PullSummary {
    let mut summary = PullSummary {
        project_name: payload.project_name.clone(),
        ..Default::default()
    };

    for (i, package) in payload.packages.iter().enumerate() {
        on_package(i + 1, package);
        match nix.install(&package.name, package.requested_version(), None) {
            Ok(info) => summary.installed.push(info),
            Err(e) => {
                warn!("Failed to install {}: {}", package.name, e);
                summary.failed.push((package.name.clone(), e.to_string()));
            }
        }
    }

    summary
}

/// Store the host's installed packages as the user's package set
pub fn sync_user_packages<R: CommandRunner>(
    nix: &NixClient<R>,
    db: &Database,
    wallet: &str,
) -> Result<Vec<UserPackage>> {
    let installed = nix.list_installed()?;
    let now = now_timestamp();
    let packages: Vec<UserPackage> = installed
        .iter()
        .map(|p| UserPackage {
            name: p.name.clone(),
            version: p.version.clone(),
            install_date: now.clone(),
            last_updated: now.clone(),
        })
        .collect();

    let user = db.with(|conn| UserRecord::upsert_packages(conn, wallet, &packages))?;
    info!("Synced {} packages for {}", user.packages.len(), wallet);
    Ok(user.packages)
}

/// Stored packages of a user; empty when the user never synced
pub fn user_packages(db: &Database, wallet: &str) -> Result<Vec<UserPackage>> {
    Ok(db
        .with(|conn| UserRecord::find_by_wallet(conn, wallet))?
        .map(|u| u.packages)
        .unwrap_or_default())
}

/// Upload a user's stored package set
pub fn push_user_packages(
    blobs: &BlobService,
    db: &Database,
    wallet: &str,
) -> Result<(String, Vec<UserPackage>)> {
    let packages = user_packages(db, wallet)?;
    if packages.is_empty() {
        return Err(Error::NotFound("No packages found for this user".to_string()));
    }

    let payload = json!({
        "packages": packages,
        "metadata": {
            "walletAddress": wallet,
            "totalCount": packages.len(),
            "timestamp": now_timestamp(),
            "source": SOURCE_CLI,
        }
    });
    let blob_id = blobs.upload_blob(
        BlobPayload::Json(payload),
        Some(&format!("User package list for {}", wallet)),
    )?;
    Ok((blob_id, packages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::db::MEMORY_URL;
    use crate::db::queries;
    use crate::nix::CommandOutput;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedProfile(String);

    impl CommandRunner for FixedProfile {
        fn run(&self, _program: &str, args: &[String], _timeout: Duration) -> Result<CommandOutput> {
            if args.iter().any(|a| a == "list") {
                Ok(CommandOutput::ok(self.0.clone()))
            } else {
                Ok(CommandOutput::failed("not scripted"))
            }
        }
    }

    fn nix_with(names: &[(&str, &str)]) -> NixClient<FixedProfile> {
        let mut elements = serde_json::Map::new();
        for (name, version) in names {
            elements.insert(
                name.to_string(),
                json!({"storePaths": [format!("/nix/store/0c3xwrbb3frh3lr7gk6ifnvrvy1x0sh5-{}-{}", name, version)]}),
            );
        }
        let listing = json!({"version": 3, "elements": elements}).to_string();
        NixClient::new(FixedProfile(listing), "nix", Duration::from_secs(5))
    }

    fn services() -> (Arc<MemoryBlobStore>, BlobService, Database) {
        let store = Arc::new(MemoryBlobStore::new());
        let blobs = BlobService::new(store.clone(), "0xsigner");
        (store, blobs, Database::connect(MEMORY_URL).unwrap())
    }

    #[test]
    fn test_publish_records_every_package() {
        let (store, blobs, db) = services();
        let nix = nix_with(&[("git", "2.44.0"), ("jq", "1.7.1"), ("curl", "8.6.0")]);

        let report = publish(&nix, &blobs, &db, "0xabc", Some("demo"), SOURCE_CLI).unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(store.write_count(), 1);

        db.with(|conn| {
            assert_eq!(PushRecord::count_by_wallet(conn, "0xabc")?, 1);
            assert_eq!(PackageRecord::count_by_blob_id(conn, &report.blob_id)?, 3);
            let history = PushHistory::list_by_wallet(conn, "0xabc")?;
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].package_count, 3);
            assert_eq!(queries::count_unique_projects(conn, "0xabc")?, 1);
            Ok(())
        })
        .unwrap();

        let (_, pulled) = fetch_snapshot(&blobs, &format!("https://walrus.example/{}", report.blob_id)).unwrap();
        assert_eq!(pulled, report.payload);
    }

    #[test]
    fn test_publish_empty_profile_uploads_nothing() {
        let (store, blobs, db) = services();
        let nix = nix_with(&[]);
        let err = publish(&nix, &blobs, &db, "0xabc", None, SOURCE_API).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_republishing_same_snapshot_is_a_warning() {
        let db = Database::connect(MEMORY_URL).unwrap();
        let installed = [PackageInfo::new("git", "2.44.0"), PackageInfo::new("jq", "1.7.1")];
        let payload = SnapshotPayload::new(&installed, Some("demo"), SOURCE_CLI).unwrap();
        assert!(record_snapshot(&db, "0xabc", "blob-1", &payload).is_empty());

        let warnings = record_snapshot(&db, "0xabc", "blob-1", &payload);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("already recorded"));

        db.with(|conn| {
            assert_eq!(PackageRecord::count_by_blob_id(conn, "blob-1")?, 2);
            assert_eq!(PushHistory::list_by_wallet(conn, "0xabc")?.len(), 1);
            assert_eq!(queries::count_total_packages(conn, "0xabc")?, 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_package_records_are_all_or_nothing() {
        let db = Database::connect(MEMORY_URL).unwrap();
        // Rejects the second package row for the blob
        db.with(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_jq BEFORE INSERT ON package_records
                 WHEN NEW.name = 'jq' BEGIN SELECT RAISE(ABORT, 'jq rejected'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        let installed = [PackageInfo::new("git", "2.44.0"), PackageInfo::new("jq", "1.7.1")];
        let payload = SnapshotPayload::new(&installed, Some("demo"), SOURCE_CLI).unwrap();
        let warnings = record_snapshot(&db, "0xabc", "blob-2", &payload);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("package records"));

        let count = db.with(|conn| PackageRecord::count_by_blob_id(conn, "blob-2")).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_blob_id_from_url() {
        assert_eq!(blob_id_from_url("https://hub.example/blob/abc123").unwrap(), "abc123");
        assert_eq!(blob_id_from_url("https://hub.example/blob/abc123/").unwrap(), "abc123");
        assert_eq!(blob_id_from_url("abc123").unwrap(), "abc123");
        assert!(matches!(blob_id_from_url("  "), Err(Error::Validation(_))));
    }

    #[test]
    fn test_parse_payload() {
        let payload = parse_payload(
            r#"{"projectName": "demo", "packages": [{"name": "git", "version": "2.44.0", "pname": "git"}]}"#,
        )
        .unwrap();
        assert_eq!(payload.project_name.as_deref(), Some("demo"));
        assert!(payload.metadata.is_none());

        assert!(matches!(parse_payload(r#"{"packages": 3}"#), Err(Error::Parse(_))));
        assert!(matches!(parse_payload("nope"), Err(Error::Parse(_))));
        assert!(matches!(parse_payload(r#"{"packages": []}"#), Err(Error::Validation(_))));
    }

    #[test]
    fn test_install_snapshot_continues_past_failures() {
        // The scripted runner fails every install
        let nix = nix_with(&[]);
        let payload = SnapshotPayload {
            project_name: Some("demo".into()),
            packages: vec![SnapshotPackage::new("git", "unknown"), SnapshotPackage::new("jq", "")],
            metadata: None,
        };
        let mut seen = Vec::new();
        let summary = install_snapshot(&nix, &payload, |i, p| seen.push((i, p.name.clone())));
        assert_eq!(seen, vec![(1, "git".to_string()), (2, "jq".to_string())]);
        assert!(summary.installed.is_empty());
        assert_eq!(summary.failed.len(), 2);
    }

    #[test]
    fn test_user_sync_and_push() {
        let (store, blobs, db) = services();
        assert!(matches!(
            push_user_packages(&blobs, &db, "0xabc"),
            Err(Error::NotFound(_))
        ));

        let nix = nix_with(&[("git", "2.44.0")]);
        let synced = sync_user_packages(&nix, &db, "0xabc").unwrap();
        assert_eq!(synced.len(), 1);
        assert_eq!(user_packages(&db, "0xabc").unwrap(), synced);

        let (blob_id, packages) = push_user_packages(&blobs, &db, "0xabc").unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(store.write_count(), 1);
        let pulled = parse_payload(&blobs.read_blob_as_text(&blob_id, None).unwrap()).unwrap();
        assert_eq!(pulled.packages[0].name, "git");
    }
}
