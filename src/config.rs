use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use anyhow::{Context, Result};
use chrono::Duration;

/// Lifetime of an access token: 1 hour.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Lifetime of a refresh token: 30 days.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;
/// Lifetime of a password-reset verification token: 5 minutes.
pub const VERIFICATION_TOKEN_TTL_SECS: i64 = 5 * 60;
/// Lifetime of a password-reset one-time code, in minutes.
pub const RESET_CODE_TTL_MINUTES: i32 = 5;

/// The memory cost for Argon2 in KiB.
const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 6;

/// How long each kind of credential lives.
#[derive(Clone, Debug)]
pub struct TokenPolicy {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub verification_ttl: Duration,
    pub reset_code_ttl_minutes: i32,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            access_ttl: Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh_ttl: Duration::seconds(REFRESH_TOKEN_TTL_SECS),
            verification_ttl: Duration::seconds(VERIFICATION_TOKEN_TTL_SECS),
            reset_code_ttl_minutes: RESET_CODE_TTL_MINUTES,
        }
    }
}

/// Argon2id cost parameters.
#[derive(Clone, Debug)]
pub struct CredentialConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            memory_kib: ARGON2_MEMORY_KIB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

/// The application's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The URL of the PostgreSQL database. The in-memory store is used when unset.
    pub database_url: Option<String>,
    /// The maximum number of pooled database connections.
    pub database_pool_size: usize,
    /// Credential lifetimes.
    pub tokens: TokenPolicy,
    /// Password hashing cost.
    pub credentials: CredentialConfig,
    /// Emails that are granted the administrator role at sign-up.
    pub admin_emails: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: None,
            database_pool_size: 16,
            tokens: TokenPolicy::default(),
            credentials: CredentialConfig::default(),
            admin_emails: Vec::new(),
        }
    }
}

/// Reads `name` and parses it, falling back to `default` when unset.
fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {name}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let access_secs = parse_env("ACCESS_TOKEN_TTL_SECS", ACCESS_TOKEN_TTL_SECS)?;
        let refresh_secs = parse_env("REFRESH_TOKEN_TTL_SECS", REFRESH_TOKEN_TTL_SECS)?;
        let verification_secs =
            parse_env("VERIFICATION_TOKEN_TTL_SECS", VERIFICATION_TOKEN_TTL_SECS)?;
        if access_secs <= 0 || refresh_secs <= 0 || verification_secs <= 0 {
            anyhow::bail!("Token lifetimes must be positive");
        }

        let admin_emails = env::var("ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: parse_env("BIND_ADDR", defaults.bind_addr)?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            database_pool_size: parse_env("DATABASE_POOL_SIZE", defaults.database_pool_size)?,
            tokens: TokenPolicy {
                access_ttl: Duration::seconds(access_secs),
                refresh_ttl: Duration::seconds(refresh_secs),
                verification_ttl: Duration::seconds(verification_secs),
                reset_code_ttl_minutes: parse_env(
                    "RESET_CODE_TTL_MINUTES",
                    RESET_CODE_TTL_MINUTES,
                )?,
            },
            credentials: CredentialConfig {
                memory_kib: parse_env("ARGON2_MEMORY_KIB", ARGON2_MEMORY_KIB)?,
                iterations: parse_env("ARGON2_ITERATIONS", ARGON2_ITERATIONS)?,
                parallelism: parse_env("ARGON2_PARALLELISM", ARGON2_PARALLELISM)?,
            },
            admin_emails,
        })
    }

    /// Whether `email` is listed in `ADMIN_EMAILS`.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|e| e.eq_ignore_ascii_case(email.trim()))
    }
}
