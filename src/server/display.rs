// src/server/display.rs

//! Stored snapshots per wallet under `/v1/display`

use super::{ApiResult, AppState, PageQuery, blocking};
use crate::db::models::PushRecord;
use crate::db::queries::{self, Pagination, WalletSummary};
use crate::error::Error;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/:wallet_address", get(snapshots))
        .route("/summary/:wallet_address", get(summary))
        .route("/blob/:blob_id", get(snapshot))
}

async fn snapshots(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let (page, limit) = (query.page(), query.limit());
    let (data, total) = blocking(move || {
        state.db.with(|conn| {
            Ok((
                queries::snapshots_page(conn, &wallet, page, limit)?,
                PushRecord::count_by_wallet(conn, &wallet)?,
            ))
        })
    })
    .await?;

    Ok(Json(json!({
        "data": data,
        "pagination": Pagination::new(page, limit, total),
    })))
}

async fn summary(State(state): State<AppState>, Path(wallet): Path<String>) -> ApiResult<Json<WalletSummary>> {
    let summary = blocking(move || state.db.with(|conn| queries::summary(conn, &wallet))).await?;
    Ok(Json(summary))
}

async fn snapshot(State(state): State<AppState>, Path(blob_id): Path<String>) -> ApiResult<Json<Value>> {
    let detail = blocking(move || {
        state
            .db
            .with(|conn| queries::push_record_with_packages(conn, &blob_id))?
            .ok_or_else(|| Error::NotFound("Data not found".to_string()))
    })
    .await?;
    Ok(Json(json!({ "data": detail })))
}
