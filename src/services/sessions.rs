//! The one-session-per-principal state machine.
//!
//! ```text
//! NoSession --login--> Active --logout--> Inactive
//!                        ^  \                |
//!                        |   `--refresh--'   |
//!                        `------login--------'
//! ```
//!
//! Sessions are never deleted by these transitions. A first login races
//! with any concurrent first login for the same principal; the store's
//! uniqueness constraint on the session principal lets exactly one insert
//! win, and the loser retries once through the update path.

use uuid::Uuid;

use crate::{
    models::{session::Session, token::TokenKind},
    repositories::{Store, StoreError},
    services::tokens::{TokenError, TokenManager},
};

/// Owns session creation, reuse, activation and token rotation.
#[derive(Clone)]
pub struct SessionManager<S> {
    store: S,
    tokens: TokenManager<S>,
}

impl<S: Store> SessionManager<S> {
    /// Creates a new `SessionManager`.
    pub fn new(store: S, tokens: TokenManager<S>) -> Self {
        Self { store, tokens }
    }

    /// Signs a principal in.
    ///
    /// Reuses and reactivates the principal's existing session with freshly
    /// rotated access and refresh tokens, or creates the first one.
    ///
    /// # Returns
    ///
    /// The active `Session` carrying live token values.
    pub async fn login(&self, user_id: Uuid) -> Result<Session, TokenError> {
        let mut retried = false;
        loop {
            if let Some(session) = self.store.find_session_by_user(user_id).await? {
                return self.reactivate(session).await;
            }

            let session = self.new_session(user_id);
            match self.store.create_session(&session).await {
                Ok(()) => {
                    tracing::info!(session_id = %session.id, %user_id, "Session created");
                    return Ok(session);
                }
                Err(StoreError::UniqueViolation(constraint)) if !retried => {
                    tracing::warn!(
                        %user_id,
                        %constraint,
                        "Concurrent first login detected, retrying through update"
                    );
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn new_session(&self, user_id: Uuid) -> Session {
        let access_token = self.tokens.mint(
            user_id,
            TokenKind::Access,
            self.tokens.ttl(TokenKind::Access),
        );
        let refresh_token = self.tokens.mint(
            user_id,
            TokenKind::Refresh,
            self.tokens.ttl(TokenKind::Refresh),
        );
        Session {
            id: Uuid::new_v4(),
            user_id,
            access_token,
            refresh_token,
            created_at: self.tokens.now(),
            active: true,
        }
    }

    async fn reactivate(&self, mut session: Session) -> Result<Session, TokenError> {
        self.tokens
            .renew(&mut session.access_token, self.tokens.ttl(TokenKind::Access));
        self.tokens
            .renew(&mut session.refresh_token, self.tokens.ttl(TokenKind::Refresh));
        session.active = true;

        self.store.save_session(&session).await?;
        tracing::info!(session_id = %session.id, user_id = %session.user_id, "Session reactivated");
        Ok(session)
    }

    /// Marks a session inactive. Its tokens are left untouched.
    pub async fn logout(&self, session_id: Uuid) -> Result<(), TokenError> {
        self.store.set_session_active(session_id, false).await?;
        tracing::info!(%session_id, "Session deactivated");
        Ok(())
    }

    /// Exchanges a refresh token for a newly rotated access token.
    ///
    /// The refresh token itself, including its expiry, is unchanged. Nothing is
    /// written when the refresh token is unknown or expired.
    pub async fn refresh(&self, refresh_value: &str) -> Result<Session, TokenError> {
        let refresh_token = self
            .tokens
            .validate(refresh_value, TokenKind::Refresh)
            .await?;

        let mut session = self
            .store
            .find_session_by_refresh_token(refresh_token.id)
            .await?
            .ok_or(TokenError::NotFound(TokenKind::Refresh))?;

        session.access_token = self
            .tokens
            .rotate(&session.access_token, self.tokens.ttl(TokenKind::Access))
            .await?;

        tracing::info!(session_id = %session.id, "Access token refreshed");
        Ok(session)
    }

    /// Resolves the session owning an access token.
    ///
    /// Does not look at `active`; the gate decides what an inactive session may do.
    pub async fn validate_access(&self, access_value: &str) -> Result<Session, TokenError> {
        let access_token = self
            .tokens
            .validate(access_value, TokenKind::Access)
            .await?;

        self.store
            .find_session_by_access_token(access_token.id)
            .await?
            .ok_or(TokenError::NotFound(TokenKind::Access))
    }

    /// Lists every session.
    pub async fn list(&self) -> Result<Vec<Session>, TokenError> {
        Ok(self.store.list_sessions().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::TokenPolicy;
    use crate::repositories::MemoryStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn manager() -> (SessionManager<MemoryStore>, MemoryStore, ManualClock) {
        let store = MemoryStore::new();
        let clock = ManualClock::default();
        let tokens = TokenManager::new(
            store.clone(),
            Arc::new(clock.clone()),
            TokenPolicy::default(),
        );
        (SessionManager::new(store.clone(), tokens), store, clock)
    }

    #[tokio::test]
    async fn test_login_creates_then_reuses_session() {
        let (sessions, store, _clock) = manager();
        let user_id = Uuid::new_v4();

        let first = sessions.login(user_id).await.unwrap();
        assert!(first.active);

        let second = sessions.login(user_id).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.access_token.id, first.access_token.id);
        assert_eq!(second.refresh_token.id, first.refresh_token.id);
        assert_ne!(second.access_token.value, first.access_token.value);
        assert_ne!(second.refresh_token.value, first.refresh_token.value);

        assert_eq!(store.list_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_login_rejects_previous_token_values() {
        let (sessions, _store, _clock) = manager();
        let user_id = Uuid::new_v4();

        let first = sessions.login(user_id).await.unwrap();
        sessions.login(user_id).await.unwrap();

        let err = sessions
            .validate_access(&first.access_token.value)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::NotFound(TokenKind::Access)));
        let err = sessions
            .refresh(&first.refresh_token.value)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid refresh token");
    }

    #[tokio::test]
    async fn test_logout_then_login_reactivates() {
        let (sessions, _store, _clock) = manager();
        let user_id = Uuid::new_v4();

        let session = sessions.login(user_id).await.unwrap();
        sessions.logout(session.id).await.unwrap();

        // Tokens remain valid; only the flag changed
        let resolved = sessions
            .validate_access(&session.access_token.value)
            .await
            .unwrap();
        assert!(!resolved.active);
        assert_eq!(resolved.access_token.value, session.access_token.value);

        let again = sessions.login(user_id).await.unwrap();
        assert!(again.active);
        assert_eq!(again.id, session.id);
    }

    #[tokio::test]
    async fn test_logout_with_stale_snapshot_keeps_current_tokens() {
        let (sessions, _store, _clock) = manager();
        let user_id = Uuid::new_v4();

        let stale = sessions.login(user_id).await.unwrap();
        let fresh = sessions.login(user_id).await.unwrap();
        sessions.logout(stale.id).await.unwrap();

        let resolved = sessions
            .validate_access(&fresh.access_token.value)
            .await
            .unwrap();
        assert!(!resolved.active);
        assert_eq!(resolved.refresh_token.value, fresh.refresh_token.value);

        assert!(matches!(
            sessions.validate_access(&stale.access_token.value).await,
            Err(TokenError::NotFound(TokenKind::Access))
        ));
        assert!(matches!(
            sessions.refresh(&stale.refresh_token.value).await,
            Err(TokenError::NotFound(TokenKind::Refresh))
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_only_access_token() {
        let (sessions, _store, clock) = manager();
        let session = sessions.login(Uuid::new_v4()).await.unwrap();

        clock.advance(Duration::minutes(90));
        // The original access token has lapsed by now
        assert!(matches!(
            sessions.validate_access(&session.access_token.value).await,
            Err(TokenError::Expired(TokenKind::Access))
        ));

        let refreshed = sessions
            .refresh(&session.refresh_token.value)
            .await
            .unwrap();
        assert_eq!(refreshed.access_token.id, session.access_token.id);
        assert_ne!(refreshed.access_token.value, session.access_token.value);
        assert_eq!(refreshed.access_token.expires_at, clock.now() + Duration::hours(1));
        assert_eq!(refreshed.refresh_token, session.refresh_token);

        assert!(sessions
            .validate_access(&refreshed.access_token.value)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_refresh_with_expired_token_mutates_nothing() {
        let (sessions, store, clock) = manager();
        let user_id = Uuid::new_v4();
        let session = sessions.login(user_id).await.unwrap();

        clock.advance(Duration::days(30) + Duration::seconds(1));
        let err = sessions
            .refresh(&session.refresh_token.value)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Expired(TokenKind::Refresh)));
        assert_eq!(err.to_string(), "Refresh token has expired");

        let stored = store.find_session_by_user(user_id).await.unwrap().unwrap();
        assert_eq!(stored.access_token, session.access_token);
    }

    #[tokio::test]
    async fn test_refresh_with_never_issued_value() {
        let (sessions, _store, _clock) = manager();
        let err = sessions.refresh("never-issued").await.unwrap_err();
        assert!(matches!(err, TokenError::NotFound(TokenKind::Refresh)));
        assert_eq!(err.to_string(), "Invalid refresh token");
    }

    #[tokio::test]
    async fn test_access_value_cannot_refresh() {
        let (sessions, _store, _clock) = manager();
        let session = sessions.login(Uuid::new_v4()).await.unwrap();

        let err = sessions
            .refresh(&session.access_token.value)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::NotFound(TokenKind::Refresh)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins_keep_one_session() {
        let (sessions, store, _clock) = manager();
        let user_id = Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let sessions = sessions.clone();
                tokio::spawn(async move { sessions.login(user_id).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.list_sessions().await.unwrap().len(), 1);
    }
}
