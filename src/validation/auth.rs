use garde::Validate;

use crate::error::{AppError, Result};

/// Runs the `garde` rules of a request payload.
///
/// # Arguments
///
/// * `payload` - The deserialized request body.
///
/// # Returns
///
/// A `Result<()>`; failures carry every violated rule, one per line.
pub fn validate_payload<T>(payload: &T) -> Result<()>
where
    T: Validate,
    T::Context: Default,
{
    payload
        .validate()
        .map_err(|report| AppError::Validation(report.to_string().trim_end().to_string()))
}

/// Validates a password.
///
/// # Arguments
///
/// * `password` - The password to validate.
/// * `_ctx` - The (unused) validation context.
///
/// # Returns
///
/// A `garde::Result` indicating whether the password is acceptable.
pub fn validate_password(password: &str, _ctx: &()) -> garde::Result {
    if password.len() < 8 {
        return Err(garde::Error::new(
            "Password must be at least 8 characters long",
        ));
    }

    if password.len() > 128 {
        return Err(garde::Error::new("Password must be at most 128 characters"));
    }

    if password.trim().is_empty() {
        return Err(garde::Error::new("Password cannot be blank"));
    }

    Ok(())
}

/// Validates a reset code: exactly six ASCII digits.
pub fn validate_reset_code(code: &str, _ctx: &()) -> garde::Result {
    let code = code.trim();
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(garde::Error::new("Code must be six digits"));
    }
    Ok(())
}
