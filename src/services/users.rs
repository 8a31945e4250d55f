use std::sync::Arc;

use uuid::Uuid;

use crate::{
    clock::Clock,
    error::{AppError, Result},
    models::user::{Admin, Role, User},
    repositories::{Store, StoreError},
    services::credentials::CredentialService,
};

/// The fields needed to create an account.
#[derive(Debug)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// The user directory: accounts, roles and administrator profiles.
#[derive(Clone)]
pub struct UserDirectory<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

fn user_not_found() -> AppError {
    AppError::NotFound("User with this id does not exist".to_string())
}

impl<S: Store> UserDirectory<S> {
    /// Creates a new `UserDirectory`.
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates a user, hashing the password through `credentials`.
    ///
    /// Users created with the administrator role also get their profile.
    pub async fn register(
        &self,
        credentials: &dyn CredentialService,
        new_user: NewUser,
    ) -> Result<User> {
        let email = new_user.email.trim().to_lowercase();
        tracing::debug!("🔐 Creating user: {}", email);

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(already_registered());
        }

        let user = User {
            id: Uuid::new_v4(),
            first_name: new_user.first_name.trim().to_string(),
            last_name: new_user.last_name.trim().to_string(),
            email,
            password: credentials.hash(&new_user.password)?,
            role: new_user.role,
            created_at: self.clock.now(),
            last_login: None,
            last_logout: None,
        };

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => return Err(already_registered()),
            Err(e) => return Err(e.into()),
        }

        if user.role == Role::Administrator {
            self.ensure_admin_profile(user.id).await?;
        }

        tracing::info!("✅ User created with ID: {}", user.id);
        Ok(user)
    }

    /// Finds a user by id.
    pub async fn find(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.store.find_user_by_id(id).await?)
    }

    /// Finds a user by email, case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .store
            .find_user_by_email(&email.trim().to_lowercase())
            .await?)
    }

    /// Lists every user.
    pub async fn list(&self) -> Result<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    /// Finds the administrator profile of a user.
    pub async fn admin_profile(&self, user_id: Uuid) -> Result<Option<Admin>> {
        Ok(self.store.find_admin_by_user(user_id).await?)
    }

    /// Grants the administrator role, creating the profile if it does not exist.
    pub async fn promote(&self, id: Uuid) -> Result<User> {
        let mut user = self.store.find_user_by_id(id).await?.ok_or_else(user_not_found)?;
        self.ensure_admin_profile(user.id).await?;

        user.role = Role::Administrator;
        self.store.update_user(&user).await?;
        tracing::info!("⬆️ User promoted to administrator: {}", user.id);
        Ok(user)
    }

    /// Drops the administrator role. The profile row is kept.
    pub async fn demote(&self, id: Uuid) -> Result<User> {
        let mut user = self.store.find_user_by_id(id).await?.ok_or_else(user_not_found)?;
        user.role = Role::Ordinary;
        self.store.update_user(&user).await?;
        tracing::info!("⬇️ User demoted to ordinary: {}", user.id);
        Ok(user)
    }

    /// Stamps `last_login`.
    pub async fn record_login(&self, user: &User) -> Result<User> {
        let mut user = user.clone();
        user.last_login = Some(self.clock.now());
        self.store.update_user(&user).await?;
        Ok(user)
    }

    /// Stamps `last_logout`.
    pub async fn record_logout(&self, user: &User) -> Result<User> {
        let mut user = user.clone();
        user.last_logout = Some(self.clock.now());
        self.store.update_user(&user).await?;
        Ok(user)
    }

    async fn ensure_admin_profile(&self, user_id: Uuid) -> Result<Admin> {
        if let Some(admin) = self.store.find_admin_by_user(user_id).await? {
            return Ok(admin);
        }

        let admin = Admin {
            id: Uuid::new_v4(),
            user_id,
        };
        match self.store.insert_admin(&admin).await {
            Ok(()) => Ok(admin),
            // Another request created it first
            Err(StoreError::UniqueViolation(_)) => self
                .store
                .find_admin_by_user(user_id)
                .await?
                .ok_or_else(|| AppError::Internal("Admin profile vanished".to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

fn already_registered() -> AppError {
    AppError::Conflict("You're already registered. Try logging in instead.".to_string())
}
