use crate::config::CredentialConfig;
use crate::error::{AppError, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

/// Hashes and verifies passwords.
///
/// The session core only ever asks "does this password match"; the algorithm
/// behind it is the implementation's business.
pub trait CredentialService: Send + Sync + 'static {
    /// Hashes a password for storage.
    fn hash(&self, password: &str) -> Result<String>;

    /// Checks a password against a stored hash.
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

/// Argon2id password hashing.
#[derive(Clone, Debug)]
pub struct Argon2Credentials {
    config: CredentialConfig,
}

impl Argon2Credentials {
    /// Creates a hasher with the given cost parameters.
    pub fn new(config: CredentialConfig) -> Self {
        Self { config }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = ParamsBuilder::new()
            .m_cost(self.config.memory_kib)
            .t_cost(self.config.iterations)
            .p_cost(self.config.parallelism)
            .build()
            .map_err(|e| AppError::Encryption(format!("Argon2 params: {}", e)))?;

        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }
}

impl CredentialService for Argon2Credentials {
    fn hash(&self, password: &str) -> Result<String> {
        let mut password_bytes = password.as_bytes().to_vec();

        let mut salt_bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|e| AppError::Internal(format!("Failed to generate salt: {}", e)))?;

        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AppError::Encryption(format!("Salt encoding error: {}", e)))?;

        let password_hash = self
            .argon2()?
            .hash_password(&password_bytes, &salt)
            .map_err(|e| AppError::Encryption(format!("Argon2 hash error: {}", e)))?
            .to_string();

        password_bytes.zeroize();
        tracing::debug!("Password hashed successfully with Argon2");
        Ok(password_hash)
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let mut password_bytes = password.as_bytes().to_vec();
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Encryption(format!("Hash parse error: {}", e)))?;

        // The hash carries its own parameters; verification does not depend on ours.
        let result = Argon2::default()
            .verify_password(&password_bytes, &parsed_hash)
            .is_ok();

        password_bytes.zeroize();
        tracing::debug!("Password verification completed");
        Ok(result)
    }
}
