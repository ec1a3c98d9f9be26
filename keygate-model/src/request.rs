//! Request payloads accepted by the auth facade.
//!
//! Shape validation lives here so the facade can reject malformed input
//! before touching the credential store. Anything beyond shape (duplicate
//! emails, credential checks) is the core's job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for user input
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password too short: minimum 8 characters required")]
    PasswordTooShort,

    #[error("Invalid display name: must be 1-100 characters")]
    InvalidDisplayName,
}

fn check_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() || email.len() > 254 {
        return Err(ValidationError::InvalidEmail);
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };

    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(())
}

fn check_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < 8 {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Registration request payload
///
/// Used to create a new account. The email must be unique (checked
/// case-insensitively by the core) and is normalized to lowercase before
/// storage.
///
/// # Example
///
/// ```json
/// {
///   "email": "alice@example.com",
///   "password": "Secr3t!pass",
///   "display_name": "Alice Smith"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Email address (case-insensitive, unique)
    pub email: String,
    /// Plain text password (will be hashed, never stored)
    pub password: String,
    /// Display name for the account
    pub display_name: String,
}

impl RegisterRequest {
    /// Validate registration request
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_email(&self.email)?;
        check_password(&self.password)?;

        if self.display_name.is_empty() || self.display_name.len() > 100 {
            return Err(ValidationError::InvalidDisplayName);
        }

        Ok(())
    }
}

/// Login request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Email address (case-insensitive)
    pub email: String,
    /// Plain text password (verified against the stored digest)
    pub password: String,
}

/// Request to replace the password of an authenticated account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    /// Current password, re-verified before the change is applied
    pub current_password: String,
    /// Replacement password
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_password(&self.new_password)
    }
}

/// Request to complete a password reset started via forgot-password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    /// Single-use reset token delivered out of band
    pub token: String,
    /// Replacement password
    pub new_password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_password(&self.new_password)
    }
}
