// src/server/users.rs

//! Per-user package sets under `/v1/users`

use super::{ApiResult, AppState, blocking};
use crate::snapshot;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/:wallet_address/packages", get(packages))
        .route("/:wallet_address/sync", post(sync))
        .route("/:wallet_address/push", post(push))
}

async fn packages(State(state): State<AppState>, Path(wallet): Path<String>) -> ApiResult<Json<Value>> {
    let packages = blocking(move || snapshot::user_packages(&state.db, &wallet)).await?;
    Ok(Json(json!({ "packages": packages })))
}

async fn sync(State(state): State<AppState>, Path(wallet): Path<String>) -> ApiResult<Json<Value>> {
    let packages = blocking(move || snapshot::sync_user_packages(&*state.nix, &state.db, &wallet)).await?;
    Ok(Json(json!({
        "message": "Packages synced successfully",
        "packages": packages,
    })))
}

async fn push(State(state): State<AppState>, Path(wallet): Path<String>) -> ApiResult<Json<Value>> {
    let (blob_id, packages) =
        blocking(move || snapshot::push_user_packages(&state.blobs, &state.db, &wallet)).await?;
    Ok(Json(json!({
        "message": "Packages pushed to hub successfully",
        "blobId": blob_id,
        "packages": packages,
    })))
}
