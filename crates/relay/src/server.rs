//! Admin HTTP API.
//!
//! | Method  | Path       | Purpose                                   |
//! |---------|------------|-------------------------------------------|
//! | `GET`   | `/health`  | liveness, never authenticated             |
//! | `GET`   | `/status`  | cursor plus scheduler state               |
//! | `GET`   | `/config`  | current settings                          |
//! | `PATCH` | `/config`  | partial settings update                   |
//! | `POST`  | `/trigger` | request an immediate pass                 |
//! | `GET`   | `/history` | recent deliveries, newest first           |
//!
//! When an admin token is configured every route except `/health` requires
//! `Authorization: Bearer <token>`. Cross-origin requests are allowed from any
//! origin so a browser dashboard can call the API; preflights are answered
//! without a token.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::scheduler::{SchedulerHandle, TriggerOutcome};
use crate::settings::{Settings, SettingsPatch};
use crate::store::{DeliveryRecord, StateStore};

/// Default and maximum number of history records returned.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 200;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StateStore>,
    pub scheduler: SchedulerHandle,
    /// Bearer token required on protected routes, if set.
    pub admin_token: Option<Arc<str>>,
}

/// Errors returned to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("missing or invalid admin token")]
    Unauthorized,

    #[error("internal error")]
    Internal,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => Self::BadRequest(e.to_string()),
            other => {
                error!(error = %other, "Store operation failed");
                Self::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the admin router.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/status", get(status))
        .route("/config", get(get_config).patch(patch_config))
        .route("/trigger", post(trigger))
        .route("/history", get(history))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API on `port` until `shutdown` is cancelled.
pub async fn run_server(
    state: AppState,
    port: u16,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Admin API listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Admin API stopped");
    Ok(())
}

async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => {
            Ok(next.run(request).await)
        }
        _ => {
            warn!(path = %request.uri().path(), "Rejected admin request");
            Err(ApiError::Unauthorized)
        }
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let cursor = state.store.read_cursor().await?;
    Ok(Json(json!({
        "cursor": cursor,
        "scheduler": state.scheduler.status(),
    })))
}

async fn get_config(State(state): State<AppState>) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.store.read_settings().await?))
}

async fn patch_config(
    State(state): State<AppState>,
    payload: Result<Json<SettingsPatch>, JsonRejection>,
) -> Result<Json<Settings>, ApiError> {
    let Json(patch) = payload?;
    let settings = state.store.update_settings(patch).await?;
    info!(?settings, "Settings updated");
    Ok(Json(settings))
}

async fn trigger(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.scheduler.trigger() {
        TriggerOutcome::Accepted => {
            info!("Manual pass triggered");
            (
                StatusCode::ACCEPTED,
                Json(json!({ "message": "Check triggered" })),
            )
        }
        TriggerOutcome::Busy => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "Sync not ready: a pass is already running" })),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<DeliveryRecord>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    Ok(Json(state.store.recent_deliveries(limit).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use crate::store::{Cursor, MemoryStore};
    use crate::testing::{uri, FakeSource, Harness, RecordingChannel};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use chrono::Utc;
    use tower::ServiceExt;

    struct Api {
        router: Router,
        store: Arc<dyn StateStore>,
        // Keeps the request channel open.
        _scheduler: Scheduler,
    }

    fn api(admin_token: Option<&str>) -> Api {
        let store = MemoryStore::default().with_cursor(Cursor::at(uri("a")));
        let h = Harness::new(FakeSource::default(), RecordingChannel::default(), Arc::new(store));
        let (scheduler, handle) = Scheduler::new(h.engine.clone());
        let router = build_router(AppState {
            store: h.store.clone(),
            scheduler: handle,
            admin_token: admin_token.map(Arc::from),
        });
        Api {
            router,
            store: h.store,
            _scheduler: scheduler,
        }
    }

    async fn call(router: &Router, request: HttpRequest<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_req(path: &str) -> HttpRequest<Body> {
        HttpRequest::get(path).body(Body::empty()).unwrap()
    }

    fn patch_req(body: &str) -> HttpRequest<Body> {
        HttpRequest::patch("/config")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_is_open_even_with_token() {
        let api = api(Some("secret"));
        let (status, body) = call(&api.router, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let api = api(Some("secret"));

        let (status, _) = call(&api.router, get_req("/config")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let wrong = HttpRequest::get("/config")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(&api.router, wrong).await.0, StatusCode::UNAUTHORIZED);

        let right = HttpRequest::get("/config")
            .header(header::AUTHORIZATION, "Bearer secret")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&api.router, right).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pollIntervalMinutes"], 5);
    }

    #[tokio::test]
    async fn test_patch_config_updates_and_validates() {
        let api = api(None);

        let (status, body) = call(
            &api.router,
            patch_req(r#"{"ignoreReplies": false, "ignoreKeywords": ["spoiler"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ignoreReplies"], false);
        assert_eq!(body["ignoreReposts"], true);
        assert_eq!(body["ignoreKeywords"], json!(["spoiler"]));

        for bad in [
            r#"{"pollIntervalMinutes": 0}"#,
            r#"{"ignoreReplies": "no"}"#,
            r#"{"unknownField": 1}"#,
            r#"{"ignoreKeywords": [" "]}"#,
            "not json",
        ] {
            let (status, body) = call(&api.router, patch_req(bad)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {bad}");
            assert!(body["error"].is_string());
        }

        // Rejected patches leave settings untouched.
        let settings = api.store.read_settings().await.unwrap();
        assert!(!settings.ignore_replies);
        assert_eq!(settings.ignore_keywords, vec!["spoiler".to_string()]);
        assert_eq!(settings.poll_interval_minutes, 5);
    }

    #[tokio::test]
    async fn test_patch_config_rejects_out_of_range_interval() {
        let api = api(None);

        for bad in [
            r#"{"pollIntervalMinutes": 18446744073709551615}"#,
            r#"{"pollIntervalMinutes": 18446744073709551616}"#,
            r#"{"pollIntervalMinutes": 10081}"#,
            r#"{"pollIntervalMinutes": -1}"#,
        ] {
            let (status, body) = call(&api.router, patch_req(bad)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {bad}");
            assert!(body["error"].is_string());
        }

        let settings = api.store.read_settings().await.unwrap();
        assert_eq!(settings.poll_interval_minutes, 5);
        assert_eq!(settings.poll_interval().as_secs(), 300);

        let (status, body) = call(&api.router, patch_req(r#"{"pollIntervalMinutes": 10080}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pollIntervalMinutes"], 10080);
    }

    #[tokio::test]
    async fn test_cross_origin_requests_are_allowed() {
        let api = api(Some("secret"));

        let request = HttpRequest::get("/health")
            .header(header::ORIGIN, "https://dashboard.example")
            .body(Body::empty())
            .unwrap();
        let response = api.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );

        // Browsers send preflights without credentials.
        let preflight = HttpRequest::options("/config")
            .header(header::ORIGIN, "https://dashboard.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
            .body(Body::empty())
            .unwrap();
        let response = api.router.clone().oneshot(preflight).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[tokio::test]
    async fn test_trigger_is_single_flight() {
        let api = api(None);
        let trigger = || HttpRequest::post("/trigger").body(Body::empty()).unwrap();

        let (status, body) = call(&api.router, trigger()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["message"], "Check triggered");

        // The scheduler loop is not running, so the first request is still pending.
        let (status, _) = call(&api.router, trigger()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (_, body) = call(&api.router, get_req("/status")).await;
        assert_eq!(body["scheduler"]["running"], true);
        assert_eq!(body["cursor"]["lastProcessedPostUri"], uri("a"));
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_clamped() {
        let api = api(None);
        for n in 0..3 {
            api.store
                .append_delivery(&DeliveryRecord {
                    post_uri: uri(&n.to_string()),
                    post_url: format!("https://bsky.app/profile/me/post/{n}"),
                    delivered_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let (status, body) = call(&api.router, get_req("/history?limit=2")).await;
        assert_eq!(status, StatusCode::OK);
        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["postUri"], uri("2"));

        let (_, body) = call(&api.router, get_req("/history?limit=0")).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = call(&api.router, get_req("/history?limit=lots")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
