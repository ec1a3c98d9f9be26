//! Configuration passed explicitly at construction time.
//!
//! Nothing in this crate reads ambient configuration: the token issuer and
//! the lifecycle manager receive their settings as plain structs.

use chrono::Duration;

use crate::policy::PasswordPolicy;

/// Settings for the token issuer.
#[derive(Clone)]
pub struct TokenConfig {
    /// Lifetime of signed access tokens
    pub access_token_ttl: Duration,
    /// Lifetime of opaque refresh tokens (and their session rows)
    pub refresh_token_ttl: Duration,
    /// HS256 signing key for access tokens
    pub signing_key: String,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenConfig {
    /// Design defaults (15 minute access, 7 day refresh) around a
    /// caller-supplied signing key.
    pub fn new(signing_key: impl Into<String>) -> Self {
        Self {
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            signing_key: signing_key.into(),
        }
    }
}

/// Settings for the account lifecycle manager.
///
/// Verification tokens carry no window of their own: they stay valid until
/// consumed, and consumption clears them. Reset tokens expire.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Validity window for password-reset tokens
    pub reset_token_ttl: Duration,
    /// Password rules enforced at registration and password change
    pub password_policy: PasswordPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            reset_token_ttl: Duration::hours(1),
            password_policy: PasswordPolicy::default(),
        }
    }
}
