// src/server/packages.rs

//! Host package list and publishing under `/v1/listPackages`

use super::{ApiError, ApiResult, AppState, blocking, wallet_from_headers};
use crate::db::models::normalize_address;
use crate::snapshot::{self, PublishReport, SOURCE_API};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_packages))
        .route("/push", post(push_packages))
}

async fn list_packages(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let nix = state.nix.clone();
    let packages = blocking(move || nix.list_installed()).await?;
    Ok(Json(json!({ "packages": packages })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushRequest {
    wallet_address: Option<String>,
    project_name: Option<String>,
}

async fn push_packages(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<PushRequest>>,
) -> ApiResult<Json<PublishReport>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let wallet = body
        .wallet_address
        .map(|w| normalize_address(&w))
        .filter(|w| !w.is_empty())
        .or_else(|| wallet_from_headers(&headers))
        .ok_or_else(|| ApiError::bad_request("Wallet address is required"))?;
    let project_name = body.project_name.filter(|p| !p.trim().is_empty());

    let report = blocking(move || {
        snapshot::publish(
            &*state.nix,
            &state.blobs,
            &state.db,
            &wallet,
            project_name.as_deref(),
            SOURCE_API,
        )
    })
    .await?;
    Ok(Json(report))
}
