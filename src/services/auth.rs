use crate::error::{AppError, Result};
use crate::models::{
    session::Session,
    user::{Role, User},
};
use crate::repositories::Store;
use crate::services::users::NewUser;
use crate::state::AppState;

fn invalid_credentials() -> AppError {
    AppError::Authentication("Invalid email or password".to_string())
}

/// Creates a new account.
///
/// Emails listed in `ADMIN_EMAILS` are registered as administrators.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `first_name` - The user's first name.
/// * `last_name` - The user's last name.
/// * `email` - The user's email.
/// * `password` - The user's password.
///
/// # Returns
///
/// A `Result` containing the created `User`.
pub async fn sign_up<S: Store>(
    state: &AppState<S>,
    first_name: String,
    last_name: String,
    email: String,
    password: String,
) -> Result<User> {
    let role = if state.config.is_admin_email(&email) {
        Role::Administrator
    } else {
        Role::Ordinary
    };

    state
        .users
        .register(
            state.credentials.as_ref(),
            NewUser {
                first_name,
                last_name,
                email,
                password,
                role,
            },
        )
        .await
}

/// Authenticates a user and opens (or reopens) their session.
///
/// Unknown emails and wrong passwords fail identically.
///
/// # Returns
///
/// A `Result` containing the `User` with `last_login` stamped, and the active `Session`.
pub async fn sign_in<S: Store>(
    state: &AppState<S>,
    email: &str,
    password: &str,
) -> Result<(User, Session)> {
    tracing::debug!("🔐 Authenticating user: {}", email);

    let user = state
        .users
        .find_by_email(email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !state.credentials.verify(password, &user.password)? {
        tracing::warn!("❌ Invalid password for user: {}", user.id);
        return Err(invalid_credentials());
    }

    let session = state.sessions.login(user.id).await?;
    let user = state.users.record_login(&user).await?;

    tracing::info!("✅ User authenticated: {}", user.id);
    Ok((user, session))
}

/// Deactivates the caller's session and stamps `last_logout`.
pub async fn sign_out<S: Store>(state: &AppState<S>, user: &User, session: &Session) -> Result<()> {
    state.sessions.logout(session.id).await?;
    state.users.record_logout(user).await?;
    tracing::info!("👋 User signed out: {}", user.id);
    Ok(())
}
