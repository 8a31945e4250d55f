use deadpool_postgres::Pool;
use tokio_postgres::{Row, types::FromSql};
use uuid::Uuid;

use crate::{
    models::{
        code::Code,
        session::Session,
        token::{Token, TokenKind},
        user::{Admin, Role, User},
    },
    repositories::{Store, StoreError},
};

const USER_COLUMNS: &str = r#"
    id, first_name, last_name, email, password, role, created_at, last_login, last_logout
"#;

const SESSION_SELECT: &str = r#"
    SELECT
        s.id, s.user_id, s.created_at, s.active,
        a.id AS access_id, a.value AS access_value, a.kind AS access_kind,
        a.created_at AS access_created_at, a.expires_at AS access_expires_at,
        r.id AS refresh_id, r.value AS refresh_value, r.kind AS refresh_kind,
        r.created_at AS refresh_created_at, r.expires_at AS refresh_expires_at
    FROM sessions s
    JOIN tokens a ON a.id = s.access_token_id
    JOIN tokens r ON r.id = s.refresh_token_id
"#;

const INSERT_TOKEN: &str = r#"
    INSERT INTO tokens (id, value, kind, user_id, created_at, expires_at)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

const UPDATE_TOKEN: &str = r#"
    UPDATE tokens
    SET value = $1, created_at = $2, expires_at = $3
    WHERE id = $4
"#;

/// A PostgreSQL-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Wraps an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// Reads a column, mapping any failure to `MissingData`.
fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T, StoreError> {
    row.try_get(name)
        .map_err(|_| StoreError::MissingData(name.to_string()))
}

fn row_to_user(row: &Row) -> Result<User, StoreError> {
    let role: String = column(row, "role")?;
    Ok(User {
        id: column(row, "id")?,
        first_name: column(row, "first_name")?,
        last_name: column(row, "last_name")?,
        email: column(row, "email")?,
        password: column(row, "password")?,
        role: role.parse::<Role>().map_err(StoreError::MissingData)?,
        created_at: column(row, "created_at")?,
        last_login: column(row, "last_login")?,
        last_logout: column(row, "last_logout")?,
    })
}

fn row_to_token(row: &Row) -> Result<Token, StoreError> {
    let kind: String = column(row, "kind")?;
    Ok(Token {
        id: column(row, "id")?,
        value: column(row, "value")?,
        kind: kind.parse::<TokenKind>().map_err(StoreError::MissingData)?,
        user_id: column(row, "user_id")?,
        created_at: column(row, "created_at")?,
        expires_at: column(row, "expires_at")?,
    })
}

/// Maps one side of the joined token columns of [`SESSION_SELECT`].
fn joined_token(row: &Row, prefix: &str, user_id: Uuid) -> Result<Token, StoreError> {
    let kind: String = column(row, &format!("{prefix}_kind"))?;
    Ok(Token {
        id: column(row, &format!("{prefix}_id"))?,
        value: column(row, &format!("{prefix}_value"))?,
        kind: kind.parse::<TokenKind>().map_err(StoreError::MissingData)?,
        user_id,
        created_at: column(row, &format!("{prefix}_created_at"))?,
        expires_at: column(row, &format!("{prefix}_expires_at"))?,
    })
}

fn row_to_session(row: &Row) -> Result<Session, StoreError> {
    let user_id: Uuid = column(row, "user_id")?;
    Ok(Session {
        id: column(row, "id")?,
        user_id,
        access_token: joined_token(row, "access", user_id)?,
        refresh_token: joined_token(row, "refresh", user_id)?,
        created_at: column(row, "created_at")?,
        active: column(row, "active")?,
    })
}

fn row_to_code(row: &Row) -> Result<Code, StoreError> {
    Ok(Code {
        id: column(row, "id")?,
        value: column(row, "value")?,
        user_id: column(row, "user_id")?,
        created_at: column(row, "created_at")?,
        expiration_minutes: column(row, "expiration_minutes")?,
    })
}

impl PgStore {
    async fn find_session_where(
        &self,
        predicate: &str,
        id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(&format!("{SESSION_SELECT} WHERE {predicate} = $1"), &[&id])
            .await?;
        row.map(|r| row_to_session(&r)).transpose()
    }
}

impl Store for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO users
                    (id, first_name, last_name, email, password, role, created_at, last_login, last_logout)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
                &[
                    &user.id,
                    &user.first_name,
                    &user.last_name,
                    &user.email,
                    &user.password,
                    &user.role.as_str(),
                    &user.created_at,
                    &user.last_login,
                    &user.last_logout,
                ],
            )
            .await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"),
                &[&id],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"),
                &[&email],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE users
                SET
                    first_name = $1,
                    last_name = $2,
                    password = $3,
                    role = $4,
                    last_login = $5,
                    last_logout = $6
                WHERE id = $7
                "#,
                &[
                    &user.first_name,
                    &user.last_name,
                    &user.password,
                    &user.role.as_str(),
                    &user.last_login,
                    &user.last_logout,
                    &user.id,
                ],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::RowNotFound("users"));
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at"),
                &[],
            )
            .await?;
        rows.iter().map(row_to_user).collect()
    }

    async fn insert_admin(&self, admin: &Admin) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO admins (id, user_id) VALUES ($1, $2)",
                &[&admin.id, &admin.user_id],
            )
            .await?;
        Ok(())
    }

    async fn find_admin_by_user(&self, user_id: Uuid) -> Result<Option<Admin>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT id, user_id FROM admins WHERE user_id = $1", &[&user_id])
            .await?;
        row.map(|r| {
            Ok(Admin {
                id: column(&r, "id")?,
                user_id: column(&r, "user_id")?,
            })
        })
        .transpose()
    }

    async fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                INSERT_TOKEN,
                &[
                    &token.id,
                    &token.value,
                    &token.kind.as_str(),
                    &token.user_id,
                    &token.created_at,
                    &token.expires_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_token(&self, token: &Token) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                UPDATE_TOKEN,
                &[&token.value, &token.created_at, &token.expires_at, &token.id],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::RowNotFound("tokens"));
        }
        Ok(())
    }

    async fn find_token_by_value(&self, value: &str) -> Result<Option<Token>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, value, kind, user_id, created_at, expires_at
                FROM tokens
                WHERE value = $1
                "#,
                &[&value],
            )
            .await?;
        row.map(|r| row_to_token(&r)).transpose()
    }

    async fn delete_token(&self, id: Uuid) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute("DELETE FROM tokens WHERE id = $1", &[&id])
            .await?;
        Ok(())
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        for token in [&session.access_token, &session.refresh_token] {
            tx.execute(
                INSERT_TOKEN,
                &[
                    &token.id,
                    &token.value,
                    &token.kind.as_str(),
                    &token.user_id,
                    &token.created_at,
                    &token.expires_at,
                ],
            )
            .await?;
        }

        tx.execute(
            r#"
            INSERT INTO sessions (id, user_id, access_token_id, refresh_token_id, created_at, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            &[
                &session.id,
                &session.user_id,
                &session.access_token.id,
                &session.refresh_token.id,
                &session.created_at,
                &session.active,
            ],
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        for token in [&session.access_token, &session.refresh_token] {
            let updated = tx
                .execute(
                    UPDATE_TOKEN,
                    &[&token.value, &token.created_at, &token.expires_at, &token.id],
                )
                .await?;
            if updated == 0 {
                return Err(StoreError::RowNotFound("tokens"));
            }
        }

        let updated = tx
            .execute(
                "UPDATE sessions SET active = $1 WHERE id = $2",
                &[&session.active, &session.id],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::RowNotFound("sessions"));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_session_active(&self, session_id: Uuid, active: bool) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE sessions SET active = $1 WHERE id = $2",
                &[&active, &session_id],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::RowNotFound("sessions"));
        }
        Ok(())
    }

    async fn find_session_by_user(&self, user_id: Uuid) -> Result<Option<Session>, StoreError> {
        self.find_session_where("s.user_id", user_id).await
    }

    async fn find_session_by_access_token(
        &self,
        token_id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        self.find_session_where("s.access_token_id", token_id).await
    }

    async fn find_session_by_refresh_token(
        &self,
        token_id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        self.find_session_where("s.refresh_token_id", token_id).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(&format!("{SESSION_SELECT} ORDER BY s.created_at"), &[])
            .await?;
        rows.iter().map(row_to_session).collect()
    }

    async fn insert_code(&self, code: &Code) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO codes (id, value, user_id, created_at, expiration_minutes)
                VALUES ($1, $2, $3, $4, $5)
                "#,
                &[
                    &code.id,
                    &code.value,
                    &code.user_id,
                    &code.created_at,
                    &code.expiration_minutes,
                ],
            )
            .await?;
        Ok(())
    }

    async fn find_code_by_value(&self, value: &str) -> Result<Option<Code>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, value, user_id, created_at, expiration_minutes
                FROM codes
                WHERE value = $1
                "#,
                &[&value],
            )
            .await?;
        row.map(|r| row_to_code(&r)).transpose()
    }

    async fn delete_code(&self, id: Uuid) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute("DELETE FROM codes WHERE id = $1", &[&id])
            .await?;
        Ok(())
    }

    async fn delete_codes_for_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute("DELETE FROM codes WHERE user_id = $1", &[&user_id])
            .await?;
        Ok(())
    }
}
