use axum::{extract::State, Json};

use crate::services::registry::RegistryStatus;
use crate::startup::AppState;

/// Provider-health snapshot for monitoring dashboards.
pub async fn email_status(State(state): State<AppState>) -> Json<RegistryStatus> {
    state.registry.refresh_health(false).await;
    Json(state.registry.status().await)
}
