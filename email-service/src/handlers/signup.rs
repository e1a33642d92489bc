use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use validator::Validate;

use crate::models::{TrialSignup, TrialSignupRequest};
use crate::startup::AppState;
use service_core::error::AppError;

const MAX_GOAL_CHARS: usize = 200;

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub signup_id: String,
    pub status: String,
    pub confirmation_sent: bool,
    pub admin_notified: bool,
}

#[tracing::instrument(skip(state, headers, request))]
pub async fn trial_signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TrialSignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    request.validate()?;

    if request.goals.iter().any(|g| g.chars().count() > MAX_GOAL_CHARS) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Goals must be at most {} characters each",
            MAX_GOAL_CHARS
        )));
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());

    let signup = TrialSignup::from_request(request, user_agent, ip_address);
    let signup_id = signup.signup_id.clone();

    // Delivery failure never fails the signup itself; the response
    // carries per-leg status instead.
    let notifications = state.email_service.send_signup_notifications(&signup).await;

    tracing::info!(
        signup_id = %signup_id,
        delivered = notifications.success_count(),
        "Trial signup processed"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SignupResponse {
            signup_id,
            status: "accepted".to_string(),
            confirmation_sent: notifications.user.success,
            admin_notified: notifications.admin.success,
        }),
    ))
}
