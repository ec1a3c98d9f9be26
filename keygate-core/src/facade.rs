//! Single entry point composing the lifecycle and session managers.
//!
//! The facade performs no business logic of its own: it routes calls and
//! shapes responses. Shaping rules worth stating: register responses carry
//! the account summary only (the verification token travels through the
//! notifier, never the response body); login/refresh responses carry the
//! opaque refresh-token string, never the session row id.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use keygate_model::{
    AccessClaims, AccountSummary, AuthToken, ChangePasswordRequest, LoginRequest,
    RegisterRequest, ResetPasswordRequest,
};

use crate::account::lifecycle::AccountLifecycleManager;
use crate::error::AuthError;
use crate::session::manager::SessionManager;
use crate::token::TokenIssuer;

/// Generic acknowledgment for operations whose only output is success.
#[derive(Debug, Clone, Serialize)]
pub struct Confirmation {
    pub message: String,
}

impl Confirmation {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Successful registration response.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub account: AccountSummary,
    pub message: String,
}

/// Successful login response.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: AuthToken,
    pub account: AccountSummary,
}

/// Aggregates the auth managers behind the seven public operations.
#[derive(Clone)]
pub struct AuthFacade {
    lifecycle: Arc<AccountLifecycleManager>,
    sessions: Arc<SessionManager>,
    issuer: Arc<TokenIssuer>,
}

impl std::fmt::Debug for AuthFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFacade").finish_non_exhaustive()
    }
}

impl AuthFacade {
    pub fn new(
        lifecycle: Arc<AccountLifecycleManager>,
        sessions: Arc<SessionManager>,
        issuer: Arc<TokenIssuer>,
    ) -> Self {
        Self {
            lifecycle,
            sessions,
            issuer,
        }
    }

    pub fn lifecycle_manager(&self) -> Arc<AccountLifecycleManager> {
        self.lifecycle.clone()
    }

    pub fn session_manager(&self) -> Arc<SessionManager> {
        self.sessions.clone()
    }

    /// Create an account. The verification token is issued for
    /// out-of-band delivery and deliberately absent from the response.
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AuthError> {
        let registered = self.lifecycle.register(request).await?;

        Ok(RegisterResponse {
            account: registered.account.summary(),
            message: "Registration successful. Check your inbox to verify your email address."
                .to_string(),
        })
    }

    /// Authenticate and open a session.
    pub async fn login(
        &self,
        request: LoginRequest,
        origin_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<LoginResponse, AuthError> {
        let (tokens, account) = self
            .sessions
            .login(&request.email, &request.password, origin_ip, user_agent)
            .await?;

        Ok(LoginResponse {
            tokens,
            account: account.summary(),
        })
    }

    /// Rotate a refresh token into a new access/refresh pair.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        origin_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AuthToken, AuthError> {
        self.sessions
            .refresh(refresh_token, origin_ip, user_agent)
            .await
    }

    /// Revoke one session (token supplied) or all of them (omitted).
    /// `account_id` comes from a verified access token.
    pub async fn logout(
        &self,
        account_id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<Confirmation, AuthError> {
        self.sessions.logout(account_id, refresh_token).await?;
        Ok(Confirmation::new("Logged out."))
    }

    /// Confirm an email address with its single-use token.
    pub async fn verify_email(&self, token: &str) -> Result<Confirmation, AuthError> {
        self.lifecycle.verify_email(token).await?;
        Ok(Confirmation::new("Email address verified."))
    }

    /// Start a password reset. The acknowledgment is identical whether or
    /// not the email is registered.
    pub async fn forgot_password(&self, email: &str) -> Result<Confirmation, AuthError> {
        self.lifecycle.forgot_password(email).await?;
        Ok(Confirmation::new(
            "If that email is registered, a reset link has been sent.",
        ))
    }

    /// Complete a password reset. All of the account's sessions are
    /// revoked on success.
    pub async fn reset_password(
        &self,
        request: ResetPasswordRequest,
    ) -> Result<Confirmation, AuthError> {
        request.validate()?;
        self.lifecycle
            .reset_password(&request.token, &request.new_password)
            .await?;
        Ok(Confirmation::new("Password reset. Please log in again."))
    }

    /// Replace the password of an authenticated account. All sessions are
    /// revoked on success. `account_id` comes from a verified access
    /// token.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<Confirmation, AuthError> {
        request.validate()?;
        self.lifecycle
            .change_password(account_id, &request.current_password, &request.new_password)
            .await?;
        Ok(Confirmation::new("Password changed. Please log in again."))
    }

    /// Verify an access token and return its claims. Purely
    /// cryptographic; this is the primitive the routing layer calls
    /// before trusting an `account_id`.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.issuer.verify_access_token(token)
    }

    /// Drop expired session rows. Advisory housekeeping.
    pub async fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        self.sessions.purge_expired().await
    }
}
