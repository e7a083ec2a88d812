/// Password Hashing and Verification
///
/// One-way credential verifier backed by bcrypt. Hashing is CPU-bound, so both
/// operations run on tokio's blocking pool.

use bcrypt::{hash, verify};

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a password using bcrypt
///
/// # Arguments
/// * `password` - Plain text password to hash
/// * `cost` - bcrypt cost factor
///
/// # Errors
/// Returns error if the password fails length validation or hashing fails
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    validate_password_length(password)?;

    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(password, cost))
        .await?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// Returns `Ok(false)` on mismatch; errors only if the stored hash is unreadable.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await?
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

/// Length bounds: at least 8 characters, at most 128 (bcrypt limit and DoS guard)
fn validate_password_length(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }

    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password".to_string(), MIN_PASSWORD_LENGTH).into());
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_LENGTH).into());
    }

    Ok(())
}
