use base64::{Engine as _, engine::general_purpose};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// The number of random bytes in a bearer token value.
const TOKEN_VALUE_SIZE: usize = 32;

/// Generates a new random bearer token value.
///
/// # Returns
///
/// A URL-safe base64-encoded value carrying 256 bits of entropy.
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_VALUE_SIZE];
    OsRng.fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a six-digit one-time code in `100000..=999999`.
pub fn generate_numeric_code() -> String {
    OsRng.gen_range(100_000..1_000_000u32).to_string()
}
