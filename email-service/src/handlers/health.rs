use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::startup::AppState;

/// Liveness probe: the process is up.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "email-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: 200 iff at least one provider is healthy.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.email_service.health().await;
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if health.healthy { "ok" } else { "unhealthy" },
            "service": "email-service",
            "providers": health.status,
        })),
    )
}
