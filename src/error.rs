use axum::{
    extract::rejection::JsonRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::token::TokenKind;
use crate::repositories::StoreError;
use crate::services::tokens::TokenError;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A persistence failure.
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    /// No `Authorization: Bearer <token>` header was presented.
    #[error("Missing or invalid authorization header")]
    MissingAuthorization,

    /// The presented value matches no token of the expected kind.
    #[error("{}", .0.not_found_message())]
    InvalidToken(TokenKind),

    /// The presented token is past its expiry.
    #[error("{}", .0.expired_message())]
    ExpiredToken(TokenKind),

    /// The session was signed out.
    #[error("Session is inactive")]
    InactiveSession,

    /// The principal lacks the administrator role.
    #[error("Admin privileges required")]
    Forbidden,

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A resource not found error.
    #[error("{0}")]
    NotFound(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A uniqueness conflict the caller can act on.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A password hashing error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::NotFound(kind) => AppError::InvalidToken(kind),
            TokenError::Expired(kind) => AppError::ExpiredToken(kind),
            TokenError::Storage(e) => AppError::Storage(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Verification tokens belong to the reset handshake, not to a bearer credential.
fn token_status(kind: TokenKind) -> StatusCode {
    match kind {
        TokenKind::Verification => StatusCode::BAD_REQUEST,
        TokenKind::Access | TokenKind::Refresh => StatusCode::UNAUTHORIZED,
    }
}

impl AppError {
    /// The status code and the message exposed to the caller.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::MissingAuthorization | AppError::InactiveSession => {
                tracing::warn!("Request rejected: {}", self);
                (StatusCode::UNAUTHORIZED, self.to_string())
            }

            AppError::InvalidToken(kind) | AppError::ExpiredToken(kind) => {
                tracing::warn!("Token rejected: {}", self);
                (token_status(*kind), self.to_string())
            }

            AppError::Forbidden => {
                tracing::warn!("Authorization failed");
                (StatusCode::FORBIDDEN, self.to_string())
            }

            AppError::Authentication(msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::NotFound(msg) => {
                tracing::debug!("Resource not found: {}", msg);
                (StatusCode::NOT_FOUND, msg.clone())
            }

            AppError::Validation(msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Conflict(msg) => {
                tracing::debug!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg.clone())
            }

            AppError::Encryption(msg) => {
                tracing::error!("Encryption error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "message": message
        }))
        .unwrap_or_else(|_| r#"{"message":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_messages_are_fixed() {
        assert_eq!(
            AppError::MissingAuthorization.status_and_message(),
            (
                StatusCode::UNAUTHORIZED,
                "Missing or invalid authorization header".to_string()
            )
        );
        assert_eq!(
            AppError::InactiveSession.status_and_message(),
            (StatusCode::UNAUTHORIZED, "Session is inactive".to_string())
        );
        assert_eq!(
            AppError::Forbidden.status_and_message(),
            (StatusCode::FORBIDDEN, "Admin privileges required".to_string())
        );
    }

    #[test]
    fn test_token_errors_carry_specific_reason() {
        let (status, message) =
            AppError::from(TokenError::Expired(TokenKind::Refresh)).status_and_message();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "Refresh token has expired");

        let (status, message) =
            AppError::from(TokenError::NotFound(TokenKind::Access)).status_and_message();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "Invalid access token");

        let (status, _) =
            AppError::from(TokenError::NotFound(TokenKind::Verification)).status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_storage_failure_does_not_leak_detail() {
        let (status, message) =
            AppError::Storage(StoreError::RowNotFound("sessions")).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }
}
