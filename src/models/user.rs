use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The closed set of roles a principal may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Ordinary,
    Administrator,
}

impl Role {
    /// The name stored in the `users.role` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Ordinary => "ordinary",
            Role::Administrator => "administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordinary" => Ok(Role::Ordinary),
            "administrator" => Ok(Role::Administrator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Represents a user in the system.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's first name.
    pub first_name: String,
    /// The user's last name.
    pub last_name: String,
    /// The user's email address.
    pub email: String,
    /// The user's hashed password.
    pub password: String,
    /// The user's role.
    pub role: Role,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp of the user's last successful sign-in.
    pub last_login: Option<DateTime<Utc>>,
    /// The timestamp of the user's last sign-out.
    pub last_logout: Option<DateTime<Utc>>,
}

/// The administrator profile attached to a user with the administrator role.
#[derive(Clone, Debug, Serialize)]
pub struct Admin {
    pub id: Uuid,
    pub user_id: Uuid,
}

/// The public view of a user, without the password hash.
#[derive(Clone, Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_logout: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: format!("{} {}", user.first_name, user.last_name),
            email: user.email.clone(),
            role: user.role,
            joined_at: user.created_at,
            last_login: user.last_login,
            last_logout: user.last_logout,
        }
    }
}
