use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::repositories::Store;
use crate::services::{
    credentials::{Argon2Credentials, CredentialService},
    password_reset::{CodeDelivery, LogDelivery, PasswordResetService},
    sessions::SessionManager,
    tokens::TokenManager,
    users::UserDirectory,
};

/// The application's state.
#[derive(Clone)]
pub struct AppState<S> {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// The one-session-per-principal state machine.
    pub sessions: SessionManager<S>,
    /// Accounts, roles and administrator profiles.
    pub users: UserDirectory<S>,
    /// The password reset handshake.
    pub resets: PasswordResetService<S>,
    /// Password hashing.
    pub credentials: Arc<dyn CredentialService>,
    /// Where reset codes are sent.
    pub delivery: Arc<dyn CodeDelivery>,
}

impl<S: Store> AppState<S> {
    /// Creates a new `AppState` on the system clock, delivering reset codes to the log.
    ///
    /// # Arguments
    ///
    /// * `store` - The persistence backend.
    /// * `config` - The application's configuration.
    pub fn new(store: S, config: Config) -> Self {
        Self::with_parts(store, config, Arc::new(SystemClock), Arc::new(LogDelivery))
    }

    /// Creates a new `AppState` with an explicit clock and code delivery.
    pub fn with_parts(
        store: S,
        config: Config,
        clock: Arc<dyn Clock>,
        delivery: Arc<dyn CodeDelivery>,
    ) -> Self {
        let tokens = TokenManager::new(store.clone(), clock.clone(), config.tokens.clone());
        tracing::info!("✅ Token manager initialized");

        let sessions = SessionManager::new(store.clone(), tokens.clone());
        let users = UserDirectory::new(store.clone(), clock);
        let resets = PasswordResetService::new(
            store,
            tokens,
            config.tokens.reset_code_ttl_minutes,
        );
        let credentials: Arc<dyn CredentialService> =
            Arc::new(Argon2Credentials::new(config.credentials.clone()));
        tracing::info!("✅ Session, user and reset services initialized");

        AppState {
            config: Arc::new(config),
            sessions,
            users,
            resets,
            credentials,
            delivery,
        }
    }
}
