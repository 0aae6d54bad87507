//! # snapie-api: Audio Upload and Playback Service
//!
//! ## API Surface
//!
//! | Prefix                 | Module               | Guard                     |
//! |------------------------|----------------------|---------------------------|
//! | `GET /api/audio*`      | [`routes::audio`]    | none                      |
//! | `POST /api/audio/play` | [`routes::audio`]    | per-client rate limit     |
//! | `POST /api/audio/upload` | [`routes::upload`] | API key, per-key rate limit |
//! | `/api/admin/*`         | [`routes::admin`]    | `ADMIN_TOKEN` bearer      |
//! | `/health/*`, `/metrics`| this module          | none                      |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → metrics → [API key → rate limit | admin auth] → Handler
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod orchestration;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::rate_limit::{rate_limit_middleware, RateKey, RateLimiter};
use crate::state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Assemble the application router.
///
/// Health probes and `/metrics` sit outside every guard.
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();
    let play_limiter = RateLimiter::new(config.play_rate, RateKey::ClientAddr);
    let upload_limiter = RateLimiter::new(config.upload_rate, RateKey::ApiKey);

    let play = routes::audio::play_router()
        .layer(from_fn_with_state(play_limiter, rate_limit_middleware));

    // Layers run bottom-up: key check first, then the limiter.
    let upload = routes::upload::router()
        .layer(from_fn_with_state(upload_limiter, rate_limit_middleware))
        .layer(from_fn(auth::api_key_middleware))
        .layer(axum::Extension(config.api_keys.clone()))
        .layer(DefaultBodyLimit::max(
            config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ));

    let admin = routes::admin::router()
        .layer(from_fn(auth::admin_middleware))
        .layer(axum::Extension(config.admin.clone()));

    let api = Router::new()
        .merge(routes::audio::router())
        .merge(play)
        .merge(upload)
        .merge(admin)
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(state.metrics.clone()));

    let ops = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(metrics));

    Router::new().merge(ops).merge(api).with_state(state)
}

/// Always 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// 503 when the database is configured but unreachable.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match &state.db_pool {
        Some(pool) => match db::ping(pool).await {
            Ok(()) => (StatusCode::OK, "ready"),
            Err(e) => {
                tracing::error!(error = %e, "readiness check failed: database unreachable");
                (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
            }
        },
        None => (StatusCode::OK, "ready"),
    }
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}
