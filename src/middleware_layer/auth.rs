use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::{
    error::{AppError, Result},
    models::{
        session::Session,
        token::TokenKind,
        user::{Admin, Role, User},
    },
    repositories::Store,
    services::tokens::redact,
    state::AppState,
};

/// What a route demands of its caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

/// The identity resolved for a request, handed to handlers through extensions.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user: User,
    pub session: Session,
    /// Present only on administrator routes.
    pub admin: Option<Admin>,
}

/// Extracts the bearer credential from the `Authorization` header.
///
/// # Arguments
///
/// * `headers` - The request headers.
///
/// # Returns
///
/// The token value, or `MissingAuthorization` if the header is absent,
/// not `Bearer <token>`, or empty.
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::MissingAuthorization)
}

/// Decides whether a request may proceed.
///
/// Returns `None` for public routes, otherwise the resolved `AuthContext`.
pub async fn authorize<S: Store>(
    state: &AppState<S>,
    headers: &HeaderMap,
    access: Access,
) -> Result<Option<AuthContext>> {
    if access == Access::Public {
        return Ok(None);
    }

    tracing::debug!("🔐 Checking authentication...");
    let token = extract_bearer_token(headers).inspect_err(|_| {
        tracing::warn!("❌ No bearer token found");
    })?;

    let session = state.sessions.validate_access(token).await.inspect_err(|e| {
        tracing::warn!(token = %redact(token), "❌ Access token rejected: {}", e);
    })?;

    if !session.active {
        tracing::warn!(session_id = %session.id, "❌ Inactive session presented");
        return Err(AppError::InactiveSession);
    }

    // A token can outlive the account it was issued to
    let user = state
        .users
        .find(session.user_id)
        .await?
        .ok_or(AppError::InvalidToken(TokenKind::Access))?;

    let admin = if access == Access::Admin {
        if user.role != Role::Administrator {
            tracing::warn!(user_id = %user.id, "❌ Administrator route refused");
            return Err(AppError::Forbidden);
        }
        let profile = state.users.admin_profile(user.id).await?.ok_or_else(|| {
            tracing::warn!(user_id = %user.id, "❌ Administrator without admin profile");
            AppError::Forbidden
        })?;
        Some(profile)
    } else {
        None
    };

    tracing::debug!("✅ User authenticated: {}", user.id);
    Ok(Some(AuthContext {
        user,
        session,
        admin,
    }))
}

async fn gate<S: Store>(
    state: &AppState<S>,
    access: Access,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    if let Some(context) = authorize(state, request.headers(), access).await? {
        request.extensions_mut().insert(context);
    }
    Ok(next.run(request).await)
}

/// A middleware that requires a valid, active session.
pub async fn require_auth<S: Store>(
    State(state): State<AppState<S>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response> {
    gate(&state, Access::Authenticated, request, next).await
}

/// A middleware that additionally requires the administrator role.
pub async fn require_admin<S: Store>(
    State(state): State<AppState<S>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response> {
    gate(&state, Access::Admin, request, next).await
}
