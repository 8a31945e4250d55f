use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The purpose a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    /// Short-lived credential presented on every gated request.
    Access,
    /// Long-lived credential used only to obtain a new access token.
    Refresh,
    /// Single-use credential that authorizes a password reset.
    Verification,
}

impl TokenKind {
    /// The name stored in the `tokens.kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "ACCESS",
            TokenKind::Refresh => "REFRESH",
            TokenKind::Verification => "VERIFICATION",
        }
    }

    /// The message reported when a presented value matches no token of this kind.
    pub fn not_found_message(&self) -> &'static str {
        match self {
            TokenKind::Access => "Invalid access token",
            TokenKind::Refresh => "Invalid refresh token",
            TokenKind::Verification => "Token not found",
        }
    }

    /// The message reported when the token of this kind is past its expiry.
    pub fn expired_message(&self) -> &'static str {
        match self {
            TokenKind::Access => "Access token has expired",
            TokenKind::Refresh => "Refresh token has expired",
            TokenKind::Verification => "Token expired",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCESS" => Ok(TokenKind::Access),
            "REFRESH" => Ok(TokenKind::Refresh),
            "VERIFICATION" => Ok(TokenKind::Verification),
            other => Err(format!("unknown token kind: {other}")),
        }
    }
}

/// An opaque bearer credential.
///
/// `value` is unique across every token in the store. Rotation replaces
/// `value`, `created_at` and `expires_at` but never `id` or `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    pub value: String,
    pub kind: TokenKind,
    /// The principal that owns this token.
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// A token is expired once `now` is strictly after `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
