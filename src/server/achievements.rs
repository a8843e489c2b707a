// src/server/achievements.rs

//! Achievement images under `/v1/achievements`

use super::{ApiError, ApiResult, AppState, PageQuery, blocking, wallet_from_headers};
use crate::achievements::{self, AchievementUpload, ImageContent, MAX_IMAGE_BYTES};
use crate::error::Error;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES * 2)),
        )
        .route("/", get(list))
        .route("/details/:blob_id", get(details))
        .route("/image/:blob_id", get(image))
}

fn require_wallet(headers: &HeaderMap) -> ApiResult<String> {
    wallet_from_headers(headers).ok_or_else(|| {
        ApiError::bad_request("Wallet address is required in the 'wallet-address' header")
    })
}

async fn read_upload(mut multipart: Multipart, user_address: String) -> ApiResult<AchievementUpload> {
    let mut upload = AchievementUpload {
        user_address,
        ..Default::default()
    };

    let malformed = |e: axum::extract::multipart::MultipartError| {
        ApiError::bad_request(format!("Malformed upload: {}", e))
    };
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                upload.mime_type = field.content_type().unwrap_or_default().to_string();
                upload.file_name = field.file_name().map(str::to_string);
                upload.image = field.bytes().await.map_err(malformed)?.to_vec();
            }
            "title" => upload.title = Some(field.text().await.map_err(malformed)?),
            "description" => upload.description = Some(field.text().await.map_err(malformed)?),
            _ => {}
        }
    }
    Ok(upload)
}

async fn upload(State(state): State<AppState>, headers: HeaderMap, multipart: Multipart) -> ApiResult<Json<Value>> {
    let wallet = require_wallet(&headers)?;
    let upload = read_upload(multipart, wallet).await?;

    let uploaded = blocking(move || achievements::upload(&state.blobs, &state.db, upload)).await?;
    Ok(Json(json!({
        "success": true,
        "blobId": uploaded.blob_id,
        "imageUrl": uploaded.image_url,
        "message": "Achievement uploaded successfully",
    })))
}

async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let wallet = require_wallet(&headers)?;
    let (page, limit) = (query.page(), query.limit());

    let (data, pagination) = blocking(move || achievements::list(&state.db, &wallet, page, limit)).await?;
    Ok(Json(json!({
        "data": data,
        "pagination": pagination,
    })))
}

async fn details(State(state): State<AppState>, Path(blob_id): Path<String>) -> ApiResult<Json<Value>> {
    let details = blocking(move || achievements::details(&state.db, &blob_id)).await?;
    let mut body = serde_json::to_value(details).map_err(|e| ApiError(Error::Json(e)))?;
    body["success"] = Value::Bool(true);
    Ok(Json(body))
}

async fn image(State(state): State<AppState>, Path(blob_id): Path<String>) -> ApiResult<Response> {
    let content = blocking(move || achievements::resolve_image(&state.blobs, &blob_id)).await?;
    let cache = (header::CACHE_CONTROL, IMAGE_CACHE_CONTROL.to_string());

    let response = match content {
        ImageContent::Image { bytes, content_type } => {
            ([cache, (header::CONTENT_TYPE, content_type.to_string())], bytes).into_response()
        }
        ImageContent::Redirect(target) => {
            (StatusCode::FOUND, [cache, (header::LOCATION, target)]).into_response()
        }
        ImageContent::Json(value) => ([cache], Json(value)).into_response(),
        ImageContent::Text(text) => {
            ([cache, (header::CONTENT_TYPE, "text/plain".to_string())], text).into_response()
        }
    };
    Ok(response)
}
