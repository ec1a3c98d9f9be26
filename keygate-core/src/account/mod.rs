//! Account records and their lifecycle transitions.

pub mod lifecycle;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use keygate_model::{AccountSummary, Role};

use crate::crypto::AuthCrypto;

/// Errors raised by account-level credential checks.
///
/// These stay internal; the managers collapse them into the coarse
/// external taxonomy so callers cannot tell which precondition failed.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account inactive")]
    AccountInactive,

    #[error("crypto error: {0}")]
    Crypto(#[from] crate::crypto::AuthCryptoError),
}

/// Persisted account row.
///
/// Token fields hold HMAC digests, never raw token values. An expired
/// reset token is treated identically to an absent one; the expiry lives
/// next to the digest so the check needs no extra lookup.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub verification_token_hash: Option<String>,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl AccountRecord {
    /// Create a fresh account: active, unverified, `Member` role, with a
    /// pending email-verification token digest.
    pub fn new(
        email: String,
        display_name: String,
        password_hash: String,
        verification_token_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email,
            display_name,
            password_hash,
            role: Role::Member,
            is_active: true,
            is_verified: false,
            verification_token_hash: Some(verification_token_hash),
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    /// Check a plaintext password against the stored digest, gated on the
    /// activity flag.
    pub fn verify_credentials(
        &self,
        password: &str,
        crypto: &AuthCrypto,
    ) -> Result<(), AccountError> {
        if !self.is_active {
            return Err(AccountError::AccountInactive);
        }

        if !crypto.verify_password(password, &self.password_hash)? {
            return Err(AccountError::InvalidCredentials);
        }

        Ok(())
    }

    /// Stamp a successful login.
    pub fn record_login(&mut self) {
        let now = Utc::now();
        self.last_login = Some(now);
        self.updated_at = now;
    }

    /// Flip the verification flag and expend the token. One-way: the token
    /// digest is cleared so a replayed token no longer matches any row.
    pub fn mark_verified(&mut self) {
        self.is_verified = true;
        self.verification_token_hash = None;
        self.updated_at = Utc::now();
    }

    /// Store a reset-token digest, replacing any prior unconsumed token.
    pub fn set_reset_token(&mut self, token_hash: String, expires_at: DateTime<Utc>) {
        self.reset_token_hash = Some(token_hash);
        self.reset_token_expires_at = Some(expires_at);
        self.updated_at = Utc::now();
    }

    /// Expend the reset token. Called after every matched use attempt,
    /// successful or not, so a token gets exactly one shot.
    pub fn clear_reset_token(&mut self) {
        self.reset_token_hash = None;
        self.reset_token_expires_at = None;
        self.updated_at = Utc::now();
    }

    /// Whether the stored reset token is still within its window.
    pub fn reset_token_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.reset_token_hash, self.reset_token_expires_at) {
            (Some(_), Some(expires_at)) => now < expires_at,
            _ => false,
        }
    }

    /// Replace the password digest.
    pub fn update_password(&mut self, new_password_hash: String) {
        debug_assert!(!new_password_hash.is_empty());
        self.password_hash = new_password_hash;
        self.updated_at = Utc::now();
    }

    /// External view; never includes digests or token material.
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            is_verified: self.is_verified,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::ParamsBuilder;
    use chrono::Duration;

    fn fast_crypto() -> AuthCrypto {
        let params = ParamsBuilder::new()
            .m_cost(8)
            .t_cost(1)
            .p_cost(1)
            .output_len(32)
            .build()
            .unwrap();
        AuthCrypto::with_params("pepper", "token-key", params).unwrap()
    }

    fn account(crypto: &AuthCrypto, password: &str) -> AccountRecord {
        AccountRecord::new(
            "alice@example.com".to_string(),
            "Alice".to_string(),
            crypto.hash_password(password).unwrap(),
            crypto.hash_token("verification-token"),
        )
    }

    #[test]
    fn fresh_accounts_are_active_and_unverified() {
        let crypto = fast_crypto();
        let account = account(&crypto, "Secr3t!pass");

        assert!(account.is_active);
        assert!(!account.is_verified);
        assert!(account.verification_token_hash.is_some());
        assert_eq!(account.role, Role::Member);
    }

    #[test]
    fn credential_check_flow() {
        let crypto = fast_crypto();
        let mut account = account(&crypto, "Secr3t!pass");

        account
            .verify_credentials("Secr3t!pass", &crypto)
            .expect("correct password verifies");
        assert!(matches!(
            account.verify_credentials("wrong", &crypto),
            Err(AccountError::InvalidCredentials)
        ));

        account.is_active = false;
        assert!(matches!(
            account.verify_credentials("Secr3t!pass", &crypto),
            Err(AccountError::AccountInactive)
        ));
    }

    #[test]
    fn verification_is_single_use() {
        let crypto = fast_crypto();
        let mut account = account(&crypto, "Secr3t!pass");

        account.mark_verified();
        assert!(account.is_verified);
        assert!(account.verification_token_hash.is_none());
    }

    #[test]
    fn reset_token_window() {
        let crypto = fast_crypto();
        let mut account = account(&crypto, "Secr3t!pass");
        let now = Utc::now();

        assert!(!account.reset_token_valid_at(now));

        account.set_reset_token("digest".to_string(), now + Duration::hours(1));
        assert!(account.reset_token_valid_at(now));
        assert!(!account.reset_token_valid_at(now + Duration::hours(2)));

        account.clear_reset_token();
        assert!(!account.reset_token_valid_at(now));
    }

    #[test]
    fn summary_excludes_secrets() {
        let crypto = fast_crypto();
        let account = account(&crypto, "Secr3t!pass");
        let summary = account.summary();

        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains(&account.password_hash));
        assert!(!json.contains("token"));
    }
}
