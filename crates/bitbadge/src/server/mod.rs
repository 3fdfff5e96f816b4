mod error;
mod session;
mod tx;

use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::{Json, Router};
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, CorsLayer};

use bitbadge_core::poller::PeriodicTask;
use bitbadge_core::AppContext;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub ctx: Arc<AppContext>,
    /// At most one confirmation watcher runs at a time.
    watcher: Mutex<Option<PeriodicTask>>,
}

impl AppState {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            watcher: Mutex::new(None),
        }
    }

    /// Start polling the reservation, replacing any running watcher.
    pub async fn restart_watcher(&self) {
        let task = self.ctx.watch(|reason| {
            tracing::info!(?reason, "confirmation watcher stopped");
        });
        let previous = self.watcher.lock().await.replace(task);
        if let Some(previous) = previous {
            previous.stop().await;
        }
    }

    pub async fn stop_watcher(&self) {
        let previous = self.watcher.lock().await.take();
        if let Some(previous) = previous {
            previous.stop().await;
        }
    }
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: SharedState, origin: &str) -> Router {
    // Only reflect the allowed origin when the request's Origin header
    // matches it exactly.
    let cors = match origin.parse::<axum::http::HeaderValue>() {
        Ok(allowed) => CorsLayer::new().allow_origin(AllowOrigin::predicate(
            move |request_origin: &axum::http::HeaderValue, _| *request_origin == allowed,
        )),
        Err(_) => {
            tracing::warn!(%origin, "origin is not a valid header value; CORS disabled");
            CorsLayer::new()
        }
    }
    .allow_methods([
        axum::http::Method::GET,
        axum::http::Method::POST,
        axum::http::Method::OPTIONS,
    ])
    .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(session::get_state))
        .route("/api/v1/transfer", get(session::get_transfer))
        .route("/api/v1/paid", get(session::paid))
        .route("/api/v1/reserve", post(session::reserve))
        .route("/api/v1/mint", post(session::mint))
        .route("/api/v1/check", post(session::check))
        .route("/api/v1/verify-merkle", post(session::verify_merkle))
        .route("/api/v1/reset", post(session::reset))
        .route("/api/v1/tx/strip", post(tx::strip))
        .route("/api/v1/tx/verify-sender", post(tx::verify_sender))
        .route("/api", any(api_not_found))
        .route("/api/{*path}", any(api_not_found))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> error::AppError {
    error::AppError::NotFound("API route not found".to_string())
}
