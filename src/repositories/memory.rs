use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    models::{
        code::Code,
        session::Session,
        token::Token,
        user::{Admin, User},
    },
    repositories::{Store, StoreError},
};

/// A session row as the relational schema stores it: tokens by id.
#[derive(Clone, Debug)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    access_token_id: Uuid,
    refresh_token_id: Uuid,
    created_at: DateTime<Utc>,
    active: bool,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    admins: HashMap<Uuid, Admin>,
    tokens: HashMap<Uuid, Token>,
    sessions: HashMap<Uuid, SessionRow>,
    codes: HashMap<Uuid, Code>,
}

impl Tables {
    fn hydrate(&self, row: &SessionRow) -> Result<Session, StoreError> {
        let token = |id: &Uuid| {
            self.tokens
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::MissingData(format!("token {id}")))
        };
        Ok(Session {
            id: row.id,
            user_id: row.user_id,
            access_token: token(&row.access_token_id)?,
            refresh_token: token(&row.refresh_token_id)?,
            created_at: row.created_at,
            active: row.active,
        })
    }

    fn find_session(
        &self,
        pred: impl Fn(&SessionRow) -> bool,
    ) -> Result<Option<Session>, StoreError> {
        self.sessions
            .values()
            .find(|row| pred(row))
            .map(|row| self.hydrate(row))
            .transpose()
    }

    /// Rejects `value` if any token other than `except` already holds it.
    fn check_token_value(&self, value: &str, except: Option<Uuid>) -> Result<(), StoreError> {
        let taken = self
            .tokens
            .values()
            .any(|t| t.value == value && Some(t.id) != except);
        if taken {
            return Err(StoreError::UniqueViolation("tokens_value_key".to_string()));
        }
        Ok(())
    }

    fn rewrite_token(&mut self, token: &Token) -> Result<(), StoreError> {
        self.check_token_value(&token.value, Some(token.id))?;
        let stored = self
            .tokens
            .get_mut(&token.id)
            .ok_or(StoreError::RowNotFound("tokens"))?;
        stored.value = token.value.clone();
        stored.created_at = token.created_at;
        stored.expires_at = token.expires_at;
        Ok(())
    }
}

/// An in-process [`Store`] with the same constraints as the relational schema.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .users
            .get_mut(&user.id)
            .ok_or(StoreError::RowNotFound("users"))?;
        stored.first_name = user.first_name.clone();
        stored.last_name = user.last_name.clone();
        stored.password = user.password.clone();
        stored.role = user.role;
        stored.last_login = user.last_login;
        stored.last_logout = user.last_logout;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn insert_admin(&self, admin: &Admin) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.admins.values().any(|a| a.user_id == admin.user_id) {
            return Err(StoreError::UniqueViolation("admins_user_id_key".to_string()));
        }
        tables.admins.insert(admin.id, admin.clone());
        Ok(())
    }

    async fn find_admin_by_user(&self, user_id: Uuid) -> Result<Option<Admin>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.admins.values().find(|a| a.user_id == user_id).cloned())
    }

    async fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.check_token_value(&token.value, None)?;
        tables.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn update_token(&self, token: &Token) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.rewrite_token(token)
    }

    async fn find_token_by_value(&self, value: &str) -> Result<Option<Token>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.tokens.values().find(|t| t.value == value).cloned())
    }

    async fn delete_token(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.tokens.remove(&id);
        Ok(())
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        if tables.sessions.values().any(|s| s.user_id == session.user_id) {
            return Err(StoreError::UniqueViolation("sessions_user_id_key".to_string()));
        }
        tables.check_token_value(&session.access_token.value, None)?;
        tables.check_token_value(&session.refresh_token.value, None)?;
        if session.access_token.value == session.refresh_token.value {
            return Err(StoreError::UniqueViolation("tokens_value_key".to_string()));
        }

        tables
            .tokens
            .insert(session.access_token.id, session.access_token.clone());
        tables
            .tokens
            .insert(session.refresh_token.id, session.refresh_token.clone());
        tables.sessions.insert(
            session.id,
            SessionRow {
                id: session.id,
                user_id: session.user_id,
                access_token_id: session.access_token.id,
                refresh_token_id: session.refresh_token.id,
                created_at: session.created_at,
                active: session.active,
            },
        );
        Ok(())
    }

    async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        // Validate everything before the first write so a failure leaves no trace.
        if !tables.sessions.contains_key(&session.id) {
            return Err(StoreError::RowNotFound("sessions"));
        }
        for token in [&session.access_token, &session.refresh_token] {
            if !tables.tokens.contains_key(&token.id) {
                return Err(StoreError::RowNotFound("tokens"));
            }
            tables.check_token_value(&token.value, Some(token.id))?;
        }
        if session.access_token.value == session.refresh_token.value {
            return Err(StoreError::UniqueViolation("tokens_value_key".to_string()));
        }

        tables.rewrite_token(&session.access_token)?;
        tables.rewrite_token(&session.refresh_token)?;
        if let Some(row) = tables.sessions.get_mut(&session.id) {
            row.active = session.active;
        }
        Ok(())
    }

    async fn set_session_active(&self, session_id: Uuid, active: bool) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .sessions
            .get_mut(&session_id)
            .ok_or(StoreError::RowNotFound("sessions"))?;
        row.active = active;
        Ok(())
    }

    async fn find_session_by_user(&self, user_id: Uuid) -> Result<Option<Session>, StoreError> {
        let tables = self.tables.lock().await;
        tables.find_session(|s| s.user_id == user_id)
    }

    async fn find_session_by_access_token(
        &self,
        token_id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        let tables = self.tables.lock().await;
        tables.find_session(|s| s.access_token_id == token_id)
    }

    async fn find_session_by_refresh_token(
        &self,
        token_id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        let tables = self.tables.lock().await;
        tables.find_session(|s| s.refresh_token_id == token_id)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let tables = self.tables.lock().await;
        let mut sessions = tables
            .sessions
            .values()
            .map(|row| tables.hydrate(row))
            .collect::<Result<Vec<_>, _>>()?;
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn insert_code(&self, code: &Code) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.codes.values().any(|c| c.value == code.value) {
            return Err(StoreError::UniqueViolation("codes_value_key".to_string()));
        }
        tables.codes.insert(code.id, code.clone());
        Ok(())
    }

    async fn find_code_by_value(&self, value: &str) -> Result<Option<Code>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.codes.values().find(|c| c.value == value).cloned())
    }

    async fn delete_code(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.codes.remove(&id);
        Ok(())
    }

    async fn delete_codes_for_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.codes.retain(|_, c| c.user_id != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::TokenKind;
    use chrono::Duration;

    fn token(user_id: Uuid, kind: TokenKind, value: &str) -> Token {
        let now = Utc::now();
        Token {
            id: Uuid::new_v4(),
            value: value.to_string(),
            kind,
            user_id,
            created_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    fn session(user_id: Uuid, access: &str, refresh: &str) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id,
            access_token: token(user_id, TokenKind::Access, access),
            refresh_token: token(user_id, TokenKind::Refresh, refresh),
            created_at: Utc::now(),
            active: true,
        }
    }

    #[tokio::test]
    async fn test_second_session_for_principal_is_rejected() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        store.create_session(&session(user_id, "a1", "r1")).await.unwrap();
        let err = store
            .create_session(&session(user_id, "a2", "r2"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::UniqueViolation(_)));
        assert_eq!(store.list_sessions().await.unwrap().len(), 1);
        // The rejected session's tokens were not written either
        assert!(store.find_token_by_value("a2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_token_value_is_rejected() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        store
            .insert_token(&token(user_id, TokenKind::Verification, "same"))
            .await
            .unwrap();
        let err = store
            .insert_token(&token(user_id, TokenKind::Verification, "same"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_save_session_rewrites_tokens_in_place() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let mut s = session(user_id, "a1", "r1");
        store.create_session(&s).await.unwrap();

        s.access_token.value = "a2".to_string();
        s.active = false;
        store.save_session(&s).await.unwrap();

        let loaded = store.find_session_by_user(user_id).await.unwrap().unwrap();
        assert_eq!(loaded.access_token.id, s.access_token.id);
        assert_eq!(loaded.access_token.value, "a2");
        assert!(!loaded.active);
        assert!(store.find_token_by_value("a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_session_collision_leaves_no_partial_write() {
        let store = MemoryStore::new();
        let first = session(Uuid::new_v4(), "a1", "r1");
        let mut second = session(Uuid::new_v4(), "a2", "r2");
        store.create_session(&first).await.unwrap();
        store.create_session(&second).await.unwrap();

        second.access_token.value = "a3".to_string();
        second.refresh_token.value = "r1".to_string();
        second.active = false;
        let err = store.save_session(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let loaded = store
            .find_session_by_user(second.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.access_token.value, "a2");
        assert!(loaded.active);
    }

    #[tokio::test]
    async fn test_set_session_active_leaves_tokens_alone() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let s = session(user_id, "a1", "r1");
        store.create_session(&s).await.unwrap();

        store.set_session_active(s.id, false).await.unwrap();

        let loaded = store.find_session_by_user(user_id).await.unwrap().unwrap();
        assert!(!loaded.active);
        assert_eq!(loaded.access_token, s.access_token);
        assert_eq!(loaded.refresh_token, s.refresh_token);

        let err = store
            .set_session_active(Uuid::new_v4(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound("sessions")));
    }
}
