use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::Result,
    handlers::{extract::JsonBody, response::ApiResponse},
    middleware_layer::auth::AuthContext,
    models::user::UserResponse,
    repositories::Store,
    state::AppState,
};

/// The request payload naming a user by id.
#[derive(Deserialize, Debug)]
pub struct IdRequest {
    pub id: Uuid,
}

/// Lists every user.
pub async fn list_users<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>> {
    let users = state.users.list().await?;
    Ok(Json(ApiResponse::with_data(
        "Users fetched successfully",
        users.iter().map(UserResponse::from).collect(),
    )))
}

/// Grants a user the administrator role.
pub async fn promote<S: Store>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(payload): JsonBody<IdRequest>,
) -> Result<Json<ApiResponse<Uuid>>> {
    tracing::info!("⬆️ Promotion of {} requested by {}", payload.id, auth.user.id);
    let user = state.users.promote(payload.id).await?;
    Ok(Json(ApiResponse::with_data(
        "User promoted to admin successfully",
        user.id,
    )))
}

/// Returns a user to the ordinary role.
pub async fn demote<S: Store>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(payload): JsonBody<IdRequest>,
) -> Result<Json<ApiResponse<Uuid>>> {
    tracing::info!("⬇️ Demotion of {} requested by {}", payload.id, auth.user.id);
    let user = state.users.demote(payload.id).await?;
    Ok(Json(ApiResponse::with_data(
        "User demoted successfully",
        user.id,
    )))
}
