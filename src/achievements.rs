// src/achievements.rs

//! Achievement images stored on the blob network
//!
//! An upload stores the image bytes as a blob and records an achievement
//! row pointing at it. The row write is best-effort: once the blob is
//! stored the upload is reported as successful.

use crate::blob::{BlobAttributes, BlobService};
use crate::db::Database;
use crate::db::models::{AchievementRecord, normalize_address};
use crate::db::queries::Pagination;
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Largest accepted image
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_TITLE: &str = "Achievement";

/// Public URL serving an achievement image
pub fn image_url(blob_id: &str) -> String {
    format!("/v1/achievements/image/{}", blob_id)
}

/// An image submitted for upload
#[derive(Debug, Clone, Default)]
pub struct AchievementUpload {
    pub user_address: String,
    pub image: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAchievement {
    pub blob_id: String,
    pub image_url: String,
}

impl AchievementUpload {
    fn validate(&self) -> Result<()> {
        if normalize_address(&self.user_address).is_empty() {
            return Err(Error::Validation("Wallet address is required".to_string()));
        }
        if self.image.is_empty() {
            return Err(Error::Validation("Image file is required".to_string()));
        }
        if !self.mime_type.starts_with("image/") {
            return Err(Error::Validation("Only image files are allowed".to_string()));
        }
        if self.image.len() > MAX_IMAGE_BYTES {
            return Err(Error::Validation(format!(
                "Image is {} bytes, the limit is {}",
                self.image.len(),
                MAX_IMAGE_BYTES
            )));
        }
        Ok(())
    }
}

/// Store an achievement image and record it for its owner
pub fn upload(blobs: &BlobService, db: &Database, upload: AchievementUpload) -> Result<UploadedAchievement> {
    upload.validate()?;

    let user_address = normalize_address(&upload.user_address);
    let title = upload
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let description = upload.description.filter(|d| !d.trim().is_empty());

    let mut attributes = BlobAttributes::new();
    attributes.insert("userAddress".to_string(), user_address.clone());
    attributes.insert("title".to_string(), title.clone());
    if let Some(description) = &description {
        attributes.insert("description".to_string(), description.clone());
    }
    if let Some(file_name) = &upload.file_name {
        attributes.insert("fileName".to_string(), file_name.clone());
    }

    let blob_id = blobs.upload_with_attributes(upload.image, &upload.mime_type, attributes)?;

    let mut record = AchievementRecord::new(&user_address, blob_id.clone(), Some(title), description);
    match db.with(|conn| record.insert(conn)) {
        Ok(_) => info!("Recorded achievement {} for {}", blob_id, user_address),
        Err(e) => warn!("Achievement {} uploaded but not recorded: {}", blob_id, e),
    }

    Ok(UploadedAchievement {
        image_url: image_url(&blob_id),
        blob_id,
    })
}

/// Achievement row plus its image URL, as listed to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementEntry {
    #[serde(flatten)]
    pub record: AchievementRecord,
    pub image_url: String,
}

/// One page of a user's achievements
pub fn list(db: &Database, user_address: &str, page: u32, limit: u32) -> Result<(Vec<AchievementEntry>, Pagination)> {
    if normalize_address(user_address).is_empty() {
        return Err(Error::Validation("Wallet address is required".to_string()));
    }
    let limit = limit.max(1);

    let (records, total) = db.with(|conn| {
        Ok((
            AchievementRecord::list_by_user_paginated(conn, user_address, page, limit)?,
            AchievementRecord::count_by_user(conn, user_address)?,
        ))
    })?;

    let entries = records
        .into_iter()
        .map(|record| AchievementEntry {
            image_url: image_url(&record.blob_id),
            record,
        })
        .collect();
    Ok((entries, Pagination::new(page, limit, total)))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementMetadata {
    pub content_type: String,
    pub file_name: String,
    pub description: String,
    pub title: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementDetails {
    pub achievement: AchievementRecord,
    pub metadata: AchievementMetadata,
}

/// Stored details of one achievement
pub fn details(db: &Database, blob_id: &str) -> Result<AchievementDetails> {
    let mut achievement = db
        .with(|conn| AchievementRecord::find_by_blob_id(conn, blob_id))?
        .ok_or_else(|| Error::NotFound(format!("Achievement with blobId {} not found", blob_id)))?;
    achievement.image = image_url(blob_id);

    let metadata = AchievementMetadata {
        content_type: "image/jpeg".to_string(),
        file_name: achievement.title.clone().unwrap_or_else(|| "unknown".to_string()),
        description: achievement.description.clone().unwrap_or_default(),
        title: achievement.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        created_at: achievement.created_at.clone(),
    };
    Ok(AchievementDetails { achievement, metadata })
}

/// What to send back for an image request
#[derive(Debug, Clone, PartialEq)]
pub enum ImageContent {
    Image { bytes: Vec<u8>, content_type: &'static str },
    /// JSON document naming an external image
    Redirect(String),
    Json(Value),
    Text(String),
}

/// Fetch an achievement blob and decide how to serve it
pub fn resolve_image(blobs: &BlobService, blob_id: &str) -> Result<ImageContent> {
    let (bytes, content_type) = blobs.read_blob_raw(blob_id)?;
    if content_type.starts_with("image/") {
        return Ok(ImageContent::Image { bytes, content_type });
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(json) => match json.get("image").and_then(Value::as_str) {
            Some(target) => Ok(ImageContent::Redirect(target.to_string())),
            None => Ok(ImageContent::Json(json)),
        },
        Err(_) => Ok(ImageContent::Text(String::from_utf8_lossy(&bytes).into_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::db::MEMORY_URL;
    use std::sync::Arc;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    fn services() -> (Arc<MemoryBlobStore>, BlobService, Database) {
        let store = Arc::new(MemoryBlobStore::new());
        let blobs = BlobService::new(store.clone(), "0xsigner");
        (store, blobs, Database::connect(MEMORY_URL).unwrap())
    }

    fn png_upload() -> AchievementUpload {
        AchievementUpload {
            user_address: "\"0xabc\"".to_string(),
            image: PNG.to_vec(),
            mime_type: "image/png".to_string(),
            file_name: Some("badge.png".to_string()),
            title: None,
            description: Some("first publish".to_string()),
        }
    }

    #[test]
    fn test_upload_and_list() {
        let (store, blobs, db) = services();
        let uploaded = upload(&blobs, &db, png_upload()).unwrap();
        assert_eq!(uploaded.image_url, format!("/v1/achievements/image/{}", uploaded.blob_id));

        let attributes = store.attributes(&uploaded.blob_id).unwrap();
        assert_eq!(attributes["contentType"], "image/png");
        assert_eq!(attributes["userAddress"], "0xabc");
        assert_eq!(attributes["fileName"], "badge.png");

        let (entries, pagination) = list(&db, "0xabc", 1, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record.title.as_deref(), Some("Achievement"));
        assert_eq!(pagination.total, 1);
        assert_eq!(pagination.total_pages, 1);
    }

    #[test]
    fn test_upload_validation() {
        let (store, blobs, db) = services();

        let mut no_wallet = png_upload();
        no_wallet.user_address = " ".into();
        assert!(matches!(upload(&blobs, &db, no_wallet), Err(Error::Validation(_))));

        let mut not_image = png_upload();
        not_image.mime_type = "text/plain".into();
        assert!(matches!(upload(&blobs, &db, not_image), Err(Error::Validation(_))));

        let mut empty = png_upload();
        empty.image.clear();
        assert!(matches!(upload(&blobs, &db, empty), Err(Error::Validation(_))));

        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_details() {
        let (_store, blobs, db) = services();
        let uploaded = upload(&blobs, &db, png_upload()).unwrap();

        let details = details(&db, &uploaded.blob_id).unwrap();
        assert_eq!(details.achievement.image, uploaded.image_url);
        assert_eq!(details.metadata.description, "first publish");
        assert!(matches!(super::details(&db, "missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_resolve_image() {
        let (store, blobs, _db) = services();

        let png = store.insert(PNG);
        assert!(matches!(
            resolve_image(&blobs, &png).unwrap(),
            ImageContent::Image { content_type: "image/png", .. }
        ));

        let pointer = store.insert(r#"{"image": "https://img.example/a.png"}"#);
        assert_eq!(
            resolve_image(&blobs, &pointer).unwrap(),
            ImageContent::Redirect("https://img.example/a.png".to_string())
        );

        let doc = store.insert(r#"{"title": "x"}"#);
        assert!(matches!(resolve_image(&blobs, &doc).unwrap(), ImageContent::Json(_)));

        let text = store.insert("just some words");
        assert_eq!(
            resolve_image(&blobs, &text).unwrap(),
            ImageContent::Text("just some words".to_string())
        );
    }
}
