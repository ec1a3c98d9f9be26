//! Orchestration of account state: registration, email verification, and
//! password reset/change.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use keygate_model::{RegisterRequest, normalize_email};

use crate::account::{AccountError, AccountRecord};
use crate::config::AuthConfig;
use crate::crypto::AuthCrypto;
use crate::error::AuthError;
use crate::repository::{AccountStore, InsertAccountError, SessionStore};
use crate::session::RevocationReason;

/// Outcome of a successful registration.
///
/// `verification_token` is the plaintext single-use token for out-of-band
/// delivery; only its digest is persisted. It must never appear in the
/// login/register API response body.
#[derive(Debug)]
pub struct RegisteredAccount {
    pub account: AccountRecord,
    pub verification_token: String,
}

/// Optional delivery channel for verification and reset tokens.
///
/// Delivery is advisory: a failing notifier is logged and the operation
/// still succeeds, since the tokens can be re-requested.
#[async_trait]
pub trait TokenNotifier: Send + Sync {
    async fn verification_token_issued(&self, email: &str, token: &str) -> anyhow::Result<()>;
    async fn reset_token_issued(&self, email: &str, token: &str) -> anyhow::Result<()>;
}

/// Orchestrates account state against the credential store.
pub struct AccountLifecycleManager {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    crypto: Arc<AuthCrypto>,
    config: AuthConfig,
    notifier: Option<Arc<dyn TokenNotifier>>,
}

impl std::fmt::Debug for AccountLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountLifecycleManager")
            .field("config", &self.config)
            .field("has_notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

impl AccountLifecycleManager {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        crypto: Arc<AuthCrypto>,
        config: AuthConfig,
    ) -> Self {
        Self {
            accounts,
            sessions,
            crypto,
            config,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn TokenNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Create a new account: unverified, active, `Member` role.
    ///
    /// Fails `Conflict` when the email is already registered in any
    /// casing. The uniqueness decision is the store's insert, not a
    /// pre-check, so two concurrent registrations of the same email
    /// resolve to exactly one winner.
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisteredAccount, AuthError> {
        request.validate()?;
        self.check_password_policy(&request.password)?;

        let email = normalize_email(&request.email);
        let password_hash = self
            .crypto
            .hash_password(&request.password)
            .map_err(|err| AuthError::ServiceUnavailable(err.into()))?;

        let verification_token = self
            .crypto
            .generate_opaque_token()
            .map_err(|err| AuthError::ServiceUnavailable(err.into()))?;

        let account = AccountRecord::new(
            email,
            request.display_name,
            password_hash,
            self.crypto.hash_token(&verification_token),
        );

        match self.accounts.insert(&account).await {
            Ok(()) => {}
            Err(InsertAccountError::DuplicateEmail) => return Err(AuthError::Conflict),
            Err(InsertAccountError::Store(err)) => return Err(err.into()),
        }

        info!(account_id = %account.id, "account registered");

        if let Some(notifier) = &self.notifier
            && let Err(err) = notifier
                .verification_token_issued(&account.email, &verification_token)
                .await
        {
            warn!(account_id = %account.id, error = %err, "verification token delivery failed");
        }

        Ok(RegisteredAccount {
            account,
            verification_token,
        })
    }

    /// Confirm an email address with its single-use token.
    ///
    /// The matching digest is cleared in the same save, so replaying the
    /// token finds no row and fails `InvalidToken`.
    pub async fn verify_email(&self, token: &str) -> Result<AccountRecord, AuthError> {
        let token_hash = self.crypto.hash_token(token);

        let mut account = self
            .accounts
            .find_by_verification_token(&token_hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        account.mark_verified();
        self.accounts.save(&account).await?;

        info!(account_id = %account.id, "email verified");

        Ok(account)
    }

    /// Start a password reset.
    ///
    /// Always succeeds from the caller's point of view: an unknown email
    /// is indistinguishable from a known one, so the endpoint cannot be
    /// used to enumerate accounts. A prior unconsumed reset token is
    /// replaced.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let Some(mut account) = self.accounts.find_by_email(&email).await? else {
            return Ok(());
        };

        let reset_token = self
            .crypto
            .generate_opaque_token()
            .map_err(|err| AuthError::ServiceUnavailable(err.into()))?;

        account.set_reset_token(
            self.crypto.hash_token(&reset_token),
            Utc::now() + self.config.reset_token_ttl,
        );
        self.accounts.save(&account).await?;

        info!(account_id = %account.id, "password reset token issued");

        if let Some(notifier) = &self.notifier
            && let Err(err) = notifier
                .reset_token_issued(&account.email, &reset_token)
                .await
        {
            warn!(account_id = %account.id, error = %err, "reset token delivery failed");
        }

        Ok(())
    }

    /// Complete a password reset with a token from [`Self::forgot_password`].
    ///
    /// A matched token is expended by this attempt whether it succeeds or
    /// turns out expired; only an unmatched digest leaves store state
    /// untouched. On success every session of the account is revoked.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        self.check_password_policy(new_password)?;

        let token_hash = self.crypto.hash_token(token);

        let mut account = self
            .accounts
            .find_by_reset_token(&token_hash)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        if !account.reset_token_valid_at(Utc::now()) {
            account.clear_reset_token();
            self.accounts.save(&account).await?;
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let password_hash = self
            .crypto
            .hash_password(new_password)
            .map_err(|err| AuthError::ServiceUnavailable(err.into()))?;

        account.update_password(password_hash);
        account.clear_reset_token();
        self.accounts.save(&account).await?;

        let revoked = self
            .sessions
            .revoke_for_account(account.id, RevocationReason::PasswordReset)
            .await?;

        info!(account_id = %account.id, revoked_sessions = revoked, "password reset completed");

        Ok(())
    }

    /// Replace the password of an authenticated account.
    ///
    /// The current password is re-verified first; a mismatch fails
    /// `InvalidCredentials` and leaves every session untouched. Success
    /// revokes all sessions to bound exposure from a possibly
    /// compromised one.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        account
            .verify_credentials(current_password, &self.crypto)
            .map_err(map_account_error)?;

        self.check_password_policy(new_password)?;

        let password_hash = self
            .crypto
            .hash_password(new_password)
            .map_err(|err| AuthError::ServiceUnavailable(err.into()))?;

        account.update_password(password_hash);
        self.accounts.save(&account).await?;

        let revoked = self
            .sessions
            .revoke_for_account(account.id, RevocationReason::PasswordChange)
            .await?;

        info!(account_id = %account.id, revoked_sessions = revoked, "password changed");

        Ok(())
    }

    fn check_password_policy(&self, password: &str) -> Result<(), AuthError> {
        let check = self.config.password_policy.check(password);
        if check.is_satisfied() {
            return Ok(());
        }

        let failures = check
            .failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Err(AuthError::WeakPassword(failures))
    }
}

fn map_account_error(err: AccountError) -> AuthError {
    match err {
        // Both collapse to the same external error so callers cannot tell
        // which precondition failed.
        AccountError::InvalidCredentials | AccountError::AccountInactive => {
            AuthError::InvalidCredentials
        }
        AccountError::Crypto(err) => AuthError::ServiceUnavailable(err.into()),
    }
}
