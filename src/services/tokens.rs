use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    clock::Clock,
    config::TokenPolicy,
    crypto::token::generate_token_value,
    models::token::{Token, TokenKind},
    repositories::{Store, StoreError},
};

/// Failures surfaced by token and session lookups.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No token of the expected kind holds the presented value.
    #[error("{}", .0.not_found_message())]
    NotFound(TokenKind),
    /// The token exists but is past its expiry.
    #[error("{}", .0.expired_message())]
    Expired(TokenKind),
    /// The store failed.
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// Shortens a token value for logging.
pub(crate) fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    format!("{prefix}…")
}

/// Issues, rotates and validates opaque bearer tokens.
#[derive(Clone)]
pub struct TokenManager<S> {
    store: S,
    clock: Arc<dyn Clock>,
    policy: TokenPolicy,
}

impl<S: Store> TokenManager<S> {
    /// Creates a new `TokenManager`.
    pub fn new(store: S, clock: Arc<dyn Clock>, policy: TokenPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// The current instant according to the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The configured lifetime for tokens of `kind`.
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.policy.access_ttl,
            TokenKind::Refresh => self.policy.refresh_ttl,
            TokenKind::Verification => self.policy.verification_ttl,
        }
    }

    /// Builds a fresh token without persisting it.
    pub fn mint(&self, user_id: Uuid, kind: TokenKind, ttl: Duration) -> Token {
        let now = self.clock.now();
        Token {
            id: Uuid::new_v4(),
            value: generate_token_value(),
            kind,
            user_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Replaces the value and timestamps of `token` without persisting it.
    ///
    /// `id`, `kind` and `user_id` are preserved.
    pub fn renew(&self, token: &mut Token, ttl: Duration) {
        let now = self.clock.now();
        token.value = generate_token_value();
        token.created_at = now;
        token.expires_at = now + ttl;
    }

    /// Issues and persists a new token.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The owning principal.
    /// * `kind` - What the token is for.
    /// * `ttl` - How long the token lives.
    ///
    /// # Returns
    ///
    /// The stored `Token`. Fails only on storage error.
    pub async fn issue(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<Token, TokenError> {
        let token = self.mint(user_id, kind, ttl);
        self.store.insert_token(&token).await?;
        tracing::debug!(token_id = %token.id, %kind, %user_id, "Issued token");
        Ok(token)
    }

    /// Rotates a stored token and returns its new state.
    ///
    /// The previous value stops validating as soon as this returns. On failure
    /// the stored token is unchanged.
    pub async fn rotate(&self, token: &Token, ttl: Duration) -> Result<Token, TokenError> {
        let mut rotated = token.clone();
        self.renew(&mut rotated, ttl);
        self.store.update_token(&rotated).await?;
        tracing::debug!(token_id = %rotated.id, kind = %rotated.kind, "Rotated token");
        Ok(rotated)
    }

    /// Looks up a token by value and checks it is of `kind` and unexpired.
    ///
    /// A value belonging to a token of another kind is reported as `NotFound`.
    pub async fn validate(&self, value: &str, kind: TokenKind) -> Result<Token, TokenError> {
        let token = match self.store.find_token_by_value(value).await? {
            Some(token) if token.kind == kind => token,
            _ => {
                tracing::debug!(value = %redact(value), %kind, "Unknown token presented");
                return Err(TokenError::NotFound(kind));
            }
        };

        if token.is_expired_at(self.clock.now()) {
            tracing::debug!(token_id = %token.id, %kind, "Token expired");
            return Err(TokenError::Expired(kind));
        }

        Ok(token)
    }

    /// Deletes a token.
    pub async fn revoke(&self, token: &Token) -> Result<(), TokenError> {
        self.store.delete_token(token.id).await?;
        tracing::debug!(token_id = %token.id, kind = %token.kind, "Revoked token");
        Ok(())
    }
}
