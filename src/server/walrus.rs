// src/server/walrus.rs

//! Raw blob access under `/v1/walrus`

use super::{ApiError, ApiResult, AppState, blocking};
use crate::blob::BlobPayload;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/download/:blob_id", get(download))
        .route("/downloadtext/:blob_id", get(download_text))
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    #[serde(default)]
    data: Value,
    description: Option<String>,
}

/// Strings are stored as text, anything else as JSON
fn payload_from(data: Value) -> Option<BlobPayload> {
    match data {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(BlobPayload::Text(text)),
        other => Some(BlobPayload::Json(other)),
    }
}

async fn upload(State(state): State<AppState>, Json(body): Json<UploadRequest>) -> ApiResult<Json<Value>> {
    let payload = payload_from(body.data).ok_or_else(|| ApiError::bad_request("Missing data"))?;
    let description = body.description;

    let blobs = state.blobs.clone();
    let blob_id = blocking(move || blobs.upload_blob(payload, description.as_deref())).await?;
    Ok(Json(json!({ "blobId": blob_id })))
}

async fn download(State(state): State<AppState>, Path(blob_id): Path<String>) -> ApiResult<Json<Value>> {
    let blobs = state.blobs.clone();
    let blob = blocking(move || blobs.read_blob_as_text(&blob_id, None)).await?;
    Ok(Json(json!({ "blob": blob })))
}

#[derive(Debug, Deserialize)]
struct EncodingQuery {
    encoding: Option<String>,
}

async fn download_text(
    State(state): State<AppState>,
    Path(blob_id): Path<String>,
    Query(query): Query<EncodingQuery>,
) -> ApiResult<Json<Value>> {
    let blobs = state.blobs.clone();
    let text = blocking(move || blobs.read_blob_as_text(&blob_id, query.encoding.as_deref())).await?;
    Ok(Json(json!({ "textContent": text })))
}
