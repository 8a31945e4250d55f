use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// A short numeric one-time code used to start a password reset.
#[derive(Clone, Debug)]
pub struct Code {
    pub id: Uuid,
    pub value: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expiration_minutes: i32,
}

impl Code {
    /// A code is expired once `created_at + expiration_minutes` is before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.created_at + Duration::minutes(i64::from(self.expiration_minutes)) < now
    }
}
