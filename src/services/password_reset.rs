use uuid::Uuid;

use crate::{
    crypto::token::generate_numeric_code,
    error::{AppError, Result},
    models::{
        code::Code,
        token::TokenKind,
        user::User,
    },
    repositories::{Store, StoreError},
    services::{
        credentials::CredentialService,
        tokens::{TokenError, TokenManager, redact},
    },
};

/// How many times a colliding code value is regenerated before giving up.
const CODE_INSERT_ATTEMPTS: usize = 3;

/// Hands a freshly created reset code to its owner.
pub trait CodeDelivery: Send + Sync + 'static {
    fn deliver(&self, user: &User, code: &Code) -> Result<()>;
}

/// Writes reset codes to the log instead of mailing them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDelivery;

impl CodeDelivery for LogDelivery {
    fn deliver(&self, user: &User, code: &Code) -> Result<()> {
        tracing::info!(
            user_id = %user.id,
            email = %user.email,
            code = %code.value,
            expiration_minutes = code.expiration_minutes,
            "📧 Password reset code issued"
        );
        Ok(())
    }
}

/// The code, verification token, new password handshake.
#[derive(Clone)]
pub struct PasswordResetService<S> {
    store: S,
    tokens: TokenManager<S>,
    code_ttl_minutes: i32,
}

impl<S: Store> PasswordResetService<S> {
    /// Creates a new `PasswordResetService`.
    pub fn new(store: S, tokens: TokenManager<S>, code_ttl_minutes: i32) -> Self {
        Self {
            store,
            tokens,
            code_ttl_minutes,
        }
    }

    /// Replaces any outstanding codes of the user with a new one and delivers it.
    pub async fn initiate(&self, email: &str, delivery: &dyn CodeDelivery) -> Result<Code> {
        let user = self
            .store
            .find_user_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        self.store.delete_codes_for_user(user.id).await?;

        let mut attempt = 0;
        let code = loop {
            attempt += 1;
            let code = Code {
                id: Uuid::new_v4(),
                value: generate_numeric_code(),
                user_id: user.id,
                created_at: self.tokens.now(),
                expiration_minutes: self.code_ttl_minutes,
            };
            match self.store.insert_code(&code).await {
                Ok(()) => break code,
                Err(StoreError::UniqueViolation(_)) if attempt < CODE_INSERT_ATTEMPTS => {
                    tracing::debug!(attempt, "Reset code collided, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        };

        delivery.deliver(&user, &code)?;
        Ok(code)
    }

    /// Exchanges a valid code for a short-lived verification token value.
    ///
    /// The code is consumed either way once found.
    pub async fn verify_code(&self, value: &str) -> Result<String> {
        let code = self
            .store
            .find_code_by_value(value.trim())
            .await?
            .ok_or_else(|| {
                AppError::NotFound("Verification code not found or has expired.".to_string())
            })?;

        if code.is_expired_at(self.tokens.now()) {
            self.store.delete_code(code.id).await?;
            tracing::debug!(user_id = %code.user_id, "Expired reset code presented");
            return Err(AppError::Validation("Verification code expired.".to_string()));
        }

        // Consumed before the token exists, so a failed delete cannot leave both usable.
        self.store.delete_code(code.id).await?;
        let token = self
            .tokens
            .issue(
                code.user_id,
                TokenKind::Verification,
                self.tokens.ttl(TokenKind::Verification),
            )
            .await?;

        tracing::info!(user_id = %code.user_id, "Reset code verified");
        Ok(token.value)
    }

    /// Sets a new password for the owner of a verification token and consumes the token.
    pub async fn reset_password(
        &self,
        credentials: &dyn CredentialService,
        token_value: &str,
        new_password: &str,
    ) -> Result<User> {
        let token = match self
            .tokens
            .validate(token_value, TokenKind::Verification)
            .await
        {
            Ok(token) => token,
            Err(TokenError::Expired(kind)) => {
                if let Some(stale) = self.store.find_token_by_value(token_value).await? {
                    self.tokens.revoke(&stale).await?;
                }
                tracing::debug!(value = %redact(token_value), "Expired verification token deleted");
                return Err(TokenError::Expired(kind).into());
            }
            Err(e) => return Err(e.into()),
        };

        let mut user = self
            .store
            .find_user_by_id(token.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if credentials.verify(new_password, &user.password)? {
            return Err(AppError::Validation(
                "Your new password cannot be the same as your current password.".to_string(),
            ));
        }

        user.password = credentials.hash(new_password)?;
        self.store.update_user(&user).await?;
        self.tokens.revoke(&token).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::{CredentialConfig, TokenPolicy};
    use crate::models::{
        session::Session,
        token::Token,
        user::{Admin, Role},
    };
    use crate::repositories::MemoryStore;
    use crate::services::credentials::Argon2Credentials;
    use chrono::Duration;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Default)]
    struct Outbox(Mutex<Vec<String>>);

    impl CodeDelivery for Outbox {
        fn deliver(&self, _user: &User, code: &Code) -> Result<()> {
            self.0.lock().unwrap().push(code.value.clone());
            Ok(())
        }
    }

    struct Fixture {
        resets: PasswordResetService<MemoryStore>,
        store: MemoryStore,
        clock: ManualClock,
        credentials: Argon2Credentials,
        user: User,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let clock = ManualClock::default();
        let tokens = TokenManager::new(
            store.clone(),
            Arc::new(clock.clone()),
            TokenPolicy::default(),
        );
        let credentials = Argon2Credentials::new(CredentialConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        });

        let user = User {
            id: Uuid::new_v4(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@campus.edu".to_string(),
            password: credentials.hash("OldPass123!").unwrap(),
            role: Role::Ordinary,
            created_at: clock.now(),
            last_login: None,
            last_logout: None,
        };
        store.insert_user(&user).await.unwrap();

        Fixture {
            resets: PasswordResetService::new(store.clone(), tokens, 5),
            store,
            clock,
            credentials,
            user,
        }
    }

    #[tokio::test]
    async fn test_full_handshake() {
        let f = fixture().await;
        let outbox = Outbox::default();

        let code = f.resets.initiate("Grace@Campus.edu", &outbox).await.unwrap();
        assert_eq!(code.value.len(), 6);
        assert_eq!(*outbox.0.lock().unwrap(), vec![code.value.clone()]);

        let token = f.resets.verify_code(&code.value).await.unwrap();
        // Codes are single use
        assert!(matches!(
            f.resets.verify_code(&code.value).await,
            Err(AppError::NotFound(_))
        ));

        f.resets
            .reset_password(&f.credentials, &token, "NewPass456!")
            .await
            .unwrap();
        let stored = f.store.find_user_by_id(f.user.id).await.unwrap().unwrap();
        assert!(f.credentials.verify("NewPass456!", &stored.password).unwrap());

        // So are verification tokens
        let err = f
            .resets
            .reset_password(&f.credentials, &token, "Another789!")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Token not found");
    }

    #[tokio::test]
    async fn test_initiate_replaces_previous_code() {
        let f = fixture().await;
        let first = f.resets.initiate(&f.user.email, &LogDelivery).await.unwrap();
        let second = f.resets.initiate(&f.user.email, &LogDelivery).await.unwrap();

        let stored = f.store.find_code_by_value(&second.value).await.unwrap().unwrap();
        assert_eq!(stored.id, second.id);
        if first.value != second.value {
            assert!(f.store.find_code_by_value(&first.value).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_initiate_unknown_email() {
        let f = fixture().await;
        let err = f
            .resets
            .initiate("nobody@campus.edu", &LogDelivery)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User not found");
    }

    #[tokio::test]
    async fn test_expired_code_is_deleted() {
        let f = fixture().await;
        let code = f.resets.initiate(&f.user.email, &LogDelivery).await.unwrap();

        f.clock.advance(Duration::minutes(5) + Duration::seconds(1));
        let err = f.resets.verify_code(&code.value).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Verification code expired."));
        assert!(f.store.find_code_by_value(&code.value).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_verification_token_is_deleted() {
        let f = fixture().await;
        let code = f.resets.initiate(&f.user.email, &LogDelivery).await.unwrap();
        let token = f.resets.verify_code(&code.value).await.unwrap();

        f.clock.advance(Duration::minutes(6));
        let err = f
            .resets
            .reset_password(&f.credentials, &token, "NewPass456!")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Token expired");
        assert!(f.store.find_token_by_value(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reusing_current_password_is_rejected() {
        let f = fixture().await;
        let code = f.resets.initiate(&f.user.email, &LogDelivery).await.unwrap();
        let token = f.resets.verify_code(&code.value).await.unwrap();

        let err = f
            .resets
            .reset_password(&f.credentials, &token, "OldPass123!")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // The token survives a rejected attempt
        assert!(f
            .resets
            .reset_password(&f.credentials, &token, "NewPass456!")
            .await
            .is_ok());
    }

    type StoreResult<T> = std::result::Result<T, StoreError>;

    /// Delegates to a `MemoryStore` but refuses to delete codes.
    #[derive(Clone, Default)]
    struct StuckCodes {
        inner: MemoryStore,
        token_inserts: Arc<AtomicUsize>,
    }

    impl Store for StuckCodes {
        async fn insert_user(&self, user: &User) -> StoreResult<()> {
            self.inner.insert_user(user).await
        }
        async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
            self.inner.find_user_by_id(id).await
        }
        async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
            self.inner.find_user_by_email(email).await
        }
        async fn update_user(&self, user: &User) -> StoreResult<()> {
            self.inner.update_user(user).await
        }
        async fn list_users(&self) -> StoreResult<Vec<User>> {
            self.inner.list_users().await
        }
        async fn insert_admin(&self, admin: &Admin) -> StoreResult<()> {
            self.inner.insert_admin(admin).await
        }
        async fn find_admin_by_user(&self, user_id: Uuid) -> StoreResult<Option<Admin>> {
            self.inner.find_admin_by_user(user_id).await
        }
        async fn insert_token(&self, token: &Token) -> StoreResult<()> {
            self.token_inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_token(token).await
        }
        async fn update_token(&self, token: &Token) -> StoreResult<()> {
            self.inner.update_token(token).await
        }
        async fn find_token_by_value(&self, value: &str) -> StoreResult<Option<Token>> {
            self.inner.find_token_by_value(value).await
        }
        async fn delete_token(&self, id: Uuid) -> StoreResult<()> {
            self.inner.delete_token(id).await
        }
        async fn create_session(&self, session: &Session) -> StoreResult<()> {
            self.inner.create_session(session).await
        }
        async fn save_session(&self, session: &Session) -> StoreResult<()> {
            self.inner.save_session(session).await
        }
        async fn set_session_active(&self, session_id: Uuid, active: bool) -> StoreResult<()> {
            self.inner.set_session_active(session_id, active).await
        }
        async fn find_session_by_user(&self, user_id: Uuid) -> StoreResult<Option<Session>> {
            self.inner.find_session_by_user(user_id).await
        }
        async fn find_session_by_access_token(
            &self,
            token_id: Uuid,
        ) -> StoreResult<Option<Session>> {
            self.inner.find_session_by_access_token(token_id).await
        }
        async fn find_session_by_refresh_token(
            &self,
            token_id: Uuid,
        ) -> StoreResult<Option<Session>> {
            self.inner.find_session_by_refresh_token(token_id).await
        }
        async fn list_sessions(&self) -> StoreResult<Vec<Session>> {
            self.inner.list_sessions().await
        }
        async fn insert_code(&self, code: &Code) -> StoreResult<()> {
            self.inner.insert_code(code).await
        }
        async fn find_code_by_value(&self, value: &str) -> StoreResult<Option<Code>> {
            self.inner.find_code_by_value(value).await
        }
        async fn delete_code(&self, _id: Uuid) -> StoreResult<()> {
            Err(StoreError::RowNotFound("codes"))
        }
        async fn delete_codes_for_user(&self, user_id: Uuid) -> StoreResult<()> {
            self.inner.delete_codes_for_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_code_delete_issues_no_token() {
        let store = StuckCodes::default();
        let clock = ManualClock::default();
        let tokens = TokenManager::new(
            store.clone(),
            Arc::new(clock.clone()),
            TokenPolicy::default(),
        );
        let resets = PasswordResetService::new(store.clone(), tokens, 5);

        let code = Code {
            id: Uuid::new_v4(),
            value: "123456".to_string(),
            user_id: Uuid::new_v4(),
            created_at: clock.now(),
            expiration_minutes: 5,
        };
        store.insert_code(&code).await.unwrap();

        let err = resets.verify_code(&code.value).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(StoreError::RowNotFound("codes"))));
        assert_eq!(store.token_inserts.load(Ordering::SeqCst), 0);
    }
}
