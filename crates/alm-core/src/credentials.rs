//! # Credentials
//!
//! Password hashing and registration validation.
//!
//! Passwords are stored as lowercase hex SHA-256 digests. Comparison is
//! constant-time.

use crate::AlmError;
use crate::primitives::{MAX_NAME_LENGTH, MIN_NAME_LENGTH, MIN_PASSWORD_LENGTH};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hash a password to lowercase hex SHA-256.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Check a password against a stored hash without leaking timing.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let computed = hash_password(password);
    let a = computed.as_bytes();
    let b = stored_hash.as_bytes();
    // Both are 64 hex chars when the stored hash is well formed.
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Validate a password length.
pub fn validate_password(password: &str) -> Result<(), AlmError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AlmError::InvalidInput(format!(
            "password must have at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate the fields of a registration request.
pub fn validate_registration(email: &str, name: &str, password: &str) -> Result<(), AlmError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AlmError::InvalidInput("email is not valid".to_string()));
    }

    let name_len = name.trim().chars().count();
    if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&name_len) {
        return Err(AlmError::InvalidInput(format!(
            "name must have between {MIN_NAME_LENGTH} and {MAX_NAME_LENGTH} characters"
        )));
    }

    validate_password(password)
}
