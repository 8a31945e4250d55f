//! Persistence boundary.
//!
//! Every service is generic over a [`Store`]. Multi-row writes
//! ([`Store::create_session`], [`Store::save_session`]) are atomic in every
//! implementation, and every implementation enforces the same uniqueness
//! constraints: token value, session principal, code value and user email.

use std::future::Future;

use thiserror::Error;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::models::{
    code::Code,
    session::Session,
    token::Token,
    user::{Admin, User},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors raised by a [`Store`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// A PostgreSQL error.
    #[error("Database error: {0}")]
    Database(tokio_postgres::Error),

    /// A connection could not be checked out of the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The pool could not be built.
    #[error("Pool setup error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// A write collided with a uniqueness constraint.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// An update targeted a row that does not exist.
    #[error("Row not found: {0}")]
    RowNotFound(&'static str),

    /// A row was missing a column or held a value that could not be decoded.
    #[error("Missing or malformed data: {0}")]
    MissingData(String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            let constraint = e
                .as_db_error()
                .and_then(|db| db.constraint())
                .unwrap_or("unknown")
                .to_string();
            return StoreError::UniqueViolation(constraint);
        }
        StoreError::Database(e)
    }
}

/// Storage for principals, tokens, sessions and one-time codes.
pub trait Store: Clone + Send + Sync + 'static {
    /// Inserts a new user. Fails with `UniqueViolation` on a duplicate email.
    fn insert_user(&self, user: &User) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Finds a user by id.
    fn find_user_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Finds a user by email.
    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Overwrites the mutable fields of an existing user.
    fn update_user(&self, user: &User) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lists every user, oldest first.
    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, StoreError>> + Send;

    /// Inserts an administrator profile.
    fn insert_admin(&self, admin: &Admin) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Finds the administrator profile of a user.
    fn find_admin_by_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<Admin>, StoreError>> + Send;

    /// Inserts a standalone token.
    fn insert_token(&self, token: &Token) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Rewrites `value`, `created_at` and `expires_at` of the token with `token.id`.
    fn update_token(&self, token: &Token) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Finds a token of any kind by its value.
    fn find_token_by_value(
        &self,
        value: &str,
    ) -> impl Future<Output = Result<Option<Token>, StoreError>> + Send;

    /// Deletes a token. Deleting an absent token is not an error.
    fn delete_token(&self, id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Inserts a session together with both of its tokens.
    ///
    /// Fails with `UniqueViolation` if the principal already has a session.
    fn create_session(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Persists both tokens and the `active` flag of an existing session.
    fn save_session(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Sets only the `active` flag of a session; its token rows are not written.
    fn set_session_active(
        &self,
        session_id: Uuid,
        active: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Finds the session of a principal.
    fn find_session_by_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Finds the session whose access token has id `token_id`.
    fn find_session_by_access_token(
        &self,
        token_id: Uuid,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Finds the session whose refresh token has id `token_id`.
    fn find_session_by_refresh_token(
        &self,
        token_id: Uuid,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Lists every session, oldest first.
    fn list_sessions(&self) -> impl Future<Output = Result<Vec<Session>, StoreError>> + Send;

    /// Inserts a one-time code. Fails with `UniqueViolation` on a duplicate value.
    fn insert_code(&self, code: &Code) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Finds a one-time code by value.
    fn find_code_by_value(
        &self,
        value: &str,
    ) -> impl Future<Output = Result<Option<Code>, StoreError>> + Send;

    /// Deletes a one-time code.
    fn delete_code(&self, id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes every one-time code owned by a user.
    fn delete_codes_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
