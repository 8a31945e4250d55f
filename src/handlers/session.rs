use axum::{Json, extract::State, http::HeaderMap};
use garde::Validate;
use serde::Deserialize;

use crate::{
    error::Result,
    handlers::{extract::JsonBody, response::ApiResponse},
    middleware_layer::auth::{Access, authorize},
    models::session::{SessionSummary, TokenPairResponse},
    repositories::Store,
    state::AppState,
    validation::auth::validate_payload,
};

/// The request payload carrying a refresh token.
#[derive(Deserialize, Debug, Validate)]
pub struct TokenRequest {
    #[garde(length(min = 1))]
    pub token: String,
}

/// Exchanges a refresh token for a new access token.
pub async fn refresh_token<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody<TokenRequest>,
) -> Result<Json<ApiResponse<TokenPairResponse>>> {
    validate_payload(&payload)?;
    let session = state.sessions.refresh(&payload.token).await?;
    Ok(Json(ApiResponse::with_data(
        "Token refreshed",
        TokenPairResponse::from(&session),
    )))
}

/// Runs the authentication gate and reports whether it passed.
pub async fn validate_session<S: Store>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse>> {
    authorize(&state, &headers, Access::Authenticated).await?;
    Ok(Json(ApiResponse::message("Session is validated")))
}

/// Lists every session without token values.
pub async fn list_sessions<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<Json<ApiResponse<Vec<SessionSummary>>>> {
    let sessions = state.sessions.list().await?;
    Ok(Json(ApiResponse::with_data(
        "Sessions fetched successfully",
        sessions.iter().map(SessionSummary::from).collect(),
    )))
}
