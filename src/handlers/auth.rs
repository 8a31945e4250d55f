use axum::{Extension, Json, extract::State, http::StatusCode};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    handlers::{extract::JsonBody, response::ApiResponse},
    middleware_layer::auth::AuthContext,
    models::{session::SessionResponse, user::UserResponse},
    repositories::Store,
    services::auth as auth_service,
    state::AppState,
    validation::auth::{validate_password, validate_payload, validate_reset_code},
};

/// The request payload for user registration.
#[derive(Deserialize, Debug, Validate)]
pub struct SignUpRequest {
    #[garde(length(min = 1, max = 100))]
    pub first_name: String,
    #[garde(length(min = 1, max = 100))]
    pub last_name: String,
    #[garde(email)]
    pub email: String,
    #[garde(custom(validate_password))]
    pub password: String,
}

/// The request payload for user login.
#[derive(Deserialize, Debug, Validate)]
pub struct SignInRequest {
    #[garde(length(min = 1))]
    pub email: String,
    #[garde(length(min = 1))]
    pub password: String,
}

/// The request payload naming an account by email.
#[derive(Deserialize, Debug, Validate)]
pub struct EmailRequest {
    #[garde(email)]
    pub email: String,
}

/// The request payload carrying a reset code.
#[derive(Deserialize, Debug, Validate)]
pub struct CodeRequest {
    #[garde(custom(validate_reset_code))]
    pub code: String,
}

/// The request payload for setting a new password.
#[derive(Deserialize, Debug, Validate)]
pub struct ResetPasswordRequest {
    #[garde(length(min = 1))]
    pub token: String,
    #[garde(custom(validate_password))]
    pub password: String,
}

/// The response payload for a successful sign-in.
#[derive(Serialize, Debug)]
pub struct SignInResponse {
    pub user: UserResponse,
    pub session: SessionResponse,
}

/// Handles user registration.
pub async fn sign_up<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody<SignUpRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    tracing::info!("📝 Register attempt for: {}", payload.email);
    validate_payload(&payload)?;

    let user = auth_service::sign_up(
        &state,
        payload.first_name,
        payload.last_name,
        payload.email,
        payload.password,
    )
    .await?;

    tracing::info!("✅ User registered: {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_data(
            "Registration successful! You can now login",
            UserResponse::from(&user),
        )),
    ))
}

/// Handles user login.
pub async fn sign_in<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody<SignInRequest>,
) -> Result<Json<ApiResponse<SignInResponse>>> {
    tracing::info!("🔐 Login attempt for: {}", payload.email);
    validate_payload(&payload)?;

    let (user, session) = auth_service::sign_in(&state, &payload.email, &payload.password).await?;

    Ok(Json(ApiResponse::with_data(
        "Login successful",
        SignInResponse {
            user: UserResponse::from(&user),
            session: SessionResponse::from(&session),
        },
    )))
}

/// Handles user logout.
pub async fn sign_out<S: Store>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse>> {
    auth_service::sign_out(&state, &auth.user, &auth.session).await?;
    Ok(Json(ApiResponse::message("Signed out successfully")))
}

/// Starts a password reset by sending a code to the account's email.
pub async fn send_code_to_mail<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> Result<Json<ApiResponse>> {
    validate_payload(&payload)?;
    state
        .resets
        .initiate(&payload.email, state.delivery.as_ref())
        .await?;
    Ok(Json(ApiResponse::message(
        "Verification code sent! Please check your inbox.",
    )))
}

/// Exchanges a reset code for a verification token.
pub async fn verify_code<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody<CodeRequest>,
) -> Result<Json<ApiResponse<String>>> {
    validate_payload(&payload)?;
    let token = state.resets.verify_code(&payload.code).await?;
    Ok(Json(ApiResponse::with_data(
        "Code verified! You can now reset your password.",
        token,
    )))
}

/// Sets a new password using a verification token.
pub async fn reset_password<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<ApiResponse>> {
    validate_payload(&payload)?;
    state
        .resets
        .reset_password(state.credentials.as_ref(), &payload.token, &payload.password)
        .await?;
    Ok(Json(ApiResponse::message(
        "Password reset successful! You can now login",
    )))
}
