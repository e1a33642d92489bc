use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::EmailResult;
use crate::startup::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct SwitchProviderRequest {
    #[validate(length(min = 1, message = "Provider name cannot be empty"))]
    pub provider: String,
}

#[derive(Debug, Serialize)]
pub struct SwitchProviderResponse {
    pub previous: String,
    pub current: String,
}

/// Runtime administrative switch of the primary provider.
#[tracing::instrument(skip(state))]
pub async fn switch_provider(
    State(state): State<AppState>,
    Json(request): Json<SwitchProviderRequest>,
) -> Result<Json<SwitchProviderResponse>, AppError> {
    request.validate()?;

    let (previous, current) = state
        .email_service
        .switch_primary_provider(&request.provider)
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    Ok(Json(SwitchProviderResponse { previous, current }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TestDeliveryRequest {
    #[validate(email(message = "Invalid email address"))]
    pub to: String,
    pub provider: Option<String>,
}

/// Send a labeled diagnostic email through a named provider, or
/// through whichever one the current strategy resolves.
#[tracing::instrument(skip(state))]
pub async fn test_delivery(
    State(state): State<AppState>,
    Json(request): Json<TestDeliveryRequest>,
) -> Result<Json<EmailResult>, AppError> {
    request.validate()?;

    let result = state
        .email_service
        .test_delivery(request.provider.as_deref(), &request.to)
        .await;

    Ok(Json(result))
}
