//! # roster-api: Student Profile Service
//!
//! Axum service exposing schema-validated CRUD over a single collection of
//! student profiles. Payloads are open JSON documents; the JSON schemas in
//! `schemas/` are the only source of structural constraints.
//!
//! ## API Surface
//!
//! | Method | Path                         | Handler                               |
//! |--------|------------------------------|---------------------------------------|
//! | POST   | `/api/createProfile`         | [`routes::profiles`] create           |
//! | GET    | `/api/getAllUsers`           | [`routes::profiles`] list             |
//! | GET    | `/api/getUserProfile/{id}`   | [`routes::profiles`] get              |
//! | PUT    | `/api/updateProfile/{id}`    | [`routes::profiles`] update           |
//! | DELETE | `/api/deleteProfile/{id}`    | [`routes::profiles`] delete           |
//! | GET    | `/health/liveness`, `/health/readiness` | probes                     |
//! | GET    | `/metrics`                   | Prometheus text format                |
//! | GET    | `/openapi.json`              | [`openapi`]                           |
//!
//! Every body, success or failure, is an [`envelope::Envelope`]. That
//! includes unknown routes (404), known paths hit with the wrong method (405)
//! and requests cut off by the timeout (408).
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! CORS → TraceLayer → MetricsMiddleware → HandleError(Timeout) → Handler
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod store;

use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{BoxError, Extension, Router};
use roster_core::Filter;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::error::AppError;
use crate::state::AppState;
use crate::store::ListQuery;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let metrics = state.metrics.clone();
    let http = state.http.clone();

    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(metrics_handler))
        .nest("/api", routes::profiles::router())
        .merge(openapi::router())
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(http.request_timeout),
        )
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(cors_layer(&http.cors_origins))
        .layer(Extension(metrics))
        .with_state(state)
}

/// CORS policy for the configured origins.
///
/// A non-empty allow-list permits credentials. An empty list allows any
/// origin without credentials, for local development.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE];
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring CORS origin that is not a valid header value");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(methods)
        .allow_headers([CONTENT_TYPE, ACCEPT, AUTHORIZATION])
        .allow_credentials(true)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 when the store answers a ping, 503 otherwise.
async fn readiness(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => "ready".into_response(),
        Err(err) => {
            tracing::warn!(error = %err, backend = state.store.backend(), "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable").into_response()
        }
    }
}

/// GET /metrics: Refresh the profile gauge and render the registry.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state
        .store
        .find_many(&ListQuery::paged(Filter::default(), 0, 1))
        .await
    {
        Ok(page) => state.metrics.set_profiles_total(page.total),
        Err(err) => tracing::warn!(error = %err, "could not count profiles for metrics"),
    }

    match state.metrics.gather_and_encode() {
        Ok(body) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn route_not_found() -> AppError {
    AppError::NotFound("route not found".to_string())
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed("method not allowed".to_string())
}

/// Turn a middleware failure into an envelope. The timed-out handler future
/// has already been dropped by the time this runs.
async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout("request timed out".to_string())
    } else {
        AppError::Internal(format!("unhandled middleware error: {err}"))
    }
}
