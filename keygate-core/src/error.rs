//! External error taxonomy of the subsystem.

use keygate_model::ValidationError;

/// Errors surfaced by the auth facade and its managers.
///
/// Every variant is terminal for the current call; nothing here is retried
/// internally. Credential-shaped failures are deliberately coarse:
/// [`AuthError::InvalidCredentials`] covers absent account, wrong password,
/// and inactive account alike so callers cannot distinguish which
/// precondition failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Email already registered (case-insensitive).
    #[error("email already registered")]
    Conflict,

    /// Bad login, or bad current password on change.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email-verification token not found or already consumed.
    #[error("invalid verification token")]
    InvalidToken,

    /// Reset token not found, already consumed, or past its expiry.
    #[error("invalid or expired reset token")]
    InvalidOrExpiredToken,

    /// Refresh token absent, revoked, rotated away, or expired.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Access token missing, malformed, tampered, or expired.
    #[error("invalid access token")]
    Unauthorized,

    /// Request payload failed shape validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Password rejected by the configured policy. Carries the failed
    /// rule labels.
    #[error("password does not satisfy policy: {0}")]
    WeakPassword(String),

    /// Underlying store unreachable or misbehaving. Surfaced as-is.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(#[from] anyhow::Error),
}
