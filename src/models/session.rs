use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::token::Token;

/// Represents the single session a principal may hold.
///
/// The access and refresh tokens are owned by value and persisted by id;
/// rotating them rewrites the token rows in place so `access_token.id` and
/// `refresh_token.id` never change for the life of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The unique identifier for the session.
    pub id: Uuid,
    /// The ID of the user this session belongs to.
    pub user_id: Uuid,
    /// The current access token.
    pub access_token: Token,
    /// The current refresh token.
    pub refresh_token: Token,
    /// The timestamp when the session was first created.
    pub created_at: DateTime<Utc>,
    /// Cleared on logout, set again on the next login.
    pub active: bool,
}

/// The public view of a session, without token values.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub active: bool,
}

/// A session as returned to its owner at sign-in.
///
/// `expires_at` is the expiry of the access token.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            access_token: session.access_token.value.clone(),
            refresh_token: session.refresh_token.value.clone(),
            expires_at: session.access_token.expires_at,
            active: session.active,
        }
    }
}

/// The token pair returned by a refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for TokenPairResponse {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.value.clone(),
            refresh_token: session.refresh_token.value.clone(),
            expires_at: session.access_token.expires_at,
        }
    }
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            active: session.active,
        }
    }
}
