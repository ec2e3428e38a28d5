use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use docnav_protocol::HealthReport;
use tower_http::trace::TraceLayer;

use super::readiness::Readiness;

pub const NOT_FOUND_HINT: &str = "Not found. MCP endpoint is at /mcp";

#[derive(Clone)]
struct HealthState {
    readiness: Readiness,
    service: Arc<str>,
}

/// Build the health router: `/health` for any method, everything else 404.
pub fn build_health_router(readiness: Readiness, service: impl Into<String>) -> Router {
    let state = HealthState {
        readiness,
        service: Arc::from(service.into()),
    };

    Router::new()
        .route("/health", any(health))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<HealthState>) -> Response {
    let ready = state.readiness.is_ready();
    let report = HealthReport::new(ready, state.service.as_ref());
    if ready {
        (StatusCode::OK, Json(report)).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            Json(report),
        )
            .into_response()
    }
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, NOT_FOUND_HINT)
}
