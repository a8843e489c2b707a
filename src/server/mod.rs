// src/server/mod.rs

//! REST API (`beacon server`)
//!
//! Thin axum handlers over the library: every handler moves its work onto
//! the blocking pool, since nix calls, blob transfers and SQLite all block.
//!
//! | Prefix | Module |
//! |---|---|
//! | `/v1/walrus` | raw blob upload and download |
//! | `/v1/listPackages` | host package list and publish |
//! | `/v1/display` | stored snapshots per wallet |
//! | `/v1/users` | per-user package sets |
//! | `/v1/achievements` | achievement images |

mod achievements;
mod display;
mod error;
mod packages;
mod users;
mod walrus;

pub use error::{ApiError, ApiResult};

use crate::blob::BlobService;
use crate::config::Config;
use crate::db::Database;
use crate::db::models::normalize_address;
use crate::error::{Error, Result};
use crate::nix::{CommandRunner, NixClient, SystemRunner};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Header carrying the caller's wallet address
pub const WALLET_HEADER: &str = "wallet-address";

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// Nix client whose runner is chosen at startup
pub type DynNixClient = NixClient<Box<dyn CommandRunner>>;

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub blobs: BlobService,
    pub nix: Arc<DynNixClient>,
}

impl AppState {
    pub fn new(db: Database, blobs: BlobService, nix: DynNixClient) -> Self {
        Self {
            db: Arc::new(db),
            blobs,
            nix: Arc::new(nix),
        }
    }

    /// Open the database and blob backend named by the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let db = Database::connect(config.require_database_url()?)?;
        let blobs = config.blob_service()?;
        let runner: Box<dyn CommandRunner> = Box::new(SystemRunner);
        let nix = NixClient::new(runner, config.nix_binary.clone(), config.nix_timeout);
        Ok(Self::new(db, blobs, nix))
    }
}

/// Run blocking work on the blocking pool
pub(crate) async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError(Error::Io(std::io::Error::other(format!(
            "request worker failed: {}",
            e
        ))))),
    }
}

/// Wallet address from the `wallet-address` header, if present and non-empty
pub(crate) fn wallet_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(WALLET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(normalize_address)
        .filter(|w| !w.is_empty())
}

/// `?page=&limit=` with defaults 1 and 10
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

impl PageQuery {
    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// All routes with CORS and request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/v1/walrus", walrus::routes())
        .nest("/v1/listPackages", packages::routes())
        .nest("/v1/display", display::routes())
        .nest("/v1/users", users::routes())
        .nest("/v1/achievements", achievements::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Beacon API listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::db::MEMORY_URL;
    use crate::nix::CommandOutput;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    struct Profile;

    impl CommandRunner for Profile {
        fn run(&self, _program: &str, args: &[String], _timeout: Duration) -> Result<crate::nix::CommandOutput> {
            if args.iter().any(|a| a == "list") {
                Ok(CommandOutput::ok(
                    r#"{"version": 3, "elements": {
                        "git": {"storePaths": ["/nix/store/0c3xwrbb3frh3lr7gk6ifnvrvy1x0sh5-git-2.44.0"]},
                        "jq": {"storePaths": ["/nix/store/1d4xwrbb3frh3lr7gk6ifnvrvy1x0sh5-jq-1.7.1"]}
                    }}"#,
                ))
            } else {
                Ok(CommandOutput::failed("not scripted"))
            }
        }
    }

    fn app() -> (Arc<MemoryBlobStore>, Router) {
        let store = Arc::new(MemoryBlobStore::new());
        let blobs = BlobService::new(store.clone(), "0xsigner");
        let runner: Box<dyn CommandRunner> = Box::new(Profile);
        let nix = NixClient::new(runner, "nix", Duration::from_secs(5));
        let state = AppState::new(Database::connect(MEMORY_URL).unwrap(), blobs, nix);
        (store, router(state))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_store, app) = app();
        let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_walrus_upload_and_download() {
        let (_store, app) = app();

        let (status, body) = send(&app, post_json("/v1/walrus/upload", json!({"data": "hello"}))).await;
        assert_eq!(status, StatusCode::OK);
        let blob_id = body["blobId"].as_str().unwrap().to_string();

        let uri = format!("/v1/walrus/downloadtext/{}?encoding=hex", blob_id);
        let (status, body) = send(&app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["textContent"], "68656c6c6f");

        let (status, body) = send(&app, post_json("/v1/walrus/upload", json!({"description": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("Missing data"));

        let uri = "/v1/walrus/download/unknown-blob";
        let (status, _) = send(&app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_push_then_display() {
        let (store, app) = app();

        let push = Request::post("/v1/listPackages/push")
            .header(WALLET_HEADER, "0xabc")
            .header("content-type", "application/json")
            .body(Body::from(json!({"projectName": "demo"}).to_string()))
            .unwrap();
        let (status, report) = send(&app, push).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["payload"]["packages"].as_array().unwrap().len(), 2);
        assert_eq!(store.write_count(), 1);
        let blob_id = report["blobId"].as_str().unwrap().to_string();

        let (status, summary) = send(
            &app,
            Request::get("/v1/display/summary/0xabc").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["totalProjects"], 1);
        assert_eq!(summary["totalPackages"], 2);

        let (status, page) = send(&app, Request::get("/v1/display/0xabc?limit=5").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["pagination"]["total"], 1);
        assert_eq!(page["data"][0]["blobId"], blob_id.as_str());

        let uri = format!("/v1/display/blob/{}", blob_id);
        let (status, detail) = send(&app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["data"]["packages"].as_array().unwrap().len(), 2);

        let (status, _) = send(&app, Request::get("/v1/display/blob/missing").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_push_requires_wallet() {
        let (store, app) = app();
        let (status, _) = send(&app, post_json("/v1/listPackages/push", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_user_sync_and_push() {
        let (store, app) = app();

        let (status, body) = send(&app, Request::post("/v1/users/0xabc/push").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].is_string());

        let (status, body) = send(&app, Request::post("/v1/users/0xabc/sync").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["packages"].as_array().unwrap().len(), 2);

        let (status, body) = send(&app, Request::post("/v1/users/0xabc/push").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["blobId"].is_string());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_achievements_need_wallet_header() {
        let (_store, app) = app();
        let (status, _) = send(&app, Request::get("/v1/achievements").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Request::get("/v1/achievements/details/missing").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_achievement_image_redirect() {
        let (store, app) = app();
        let id = store.insert(r#"{"image": "https://img.example/a.png"}"#);

        let uri = format!("/v1/achievements/image/{}", id);
        let response = app.oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "https://img.example/a.png");
        assert_eq!(response.headers()["cache-control"], "public, max-age=86400");
    }
}
