//! Login, refresh rotation, and revocation against the session store.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use keygate_model::{AuthToken, Role, normalize_email};

use crate::account::AccountRecord;
use crate::crypto::AuthCrypto;
use crate::error::AuthError;
use crate::repository::{AccountStore, SessionStore};
use crate::session::{RevocationReason, SessionRecord};
use crate::token::{RefreshToken, TokenIssuer};

/// Orchestrates token issuance and session rows.
///
/// Sessions are only ever written through this manager (and revoked in
/// bulk by the lifecycle manager on credential changes). One session row
/// per outstanding refresh token; rotation revokes the consumed row and
/// inserts its successor in the same call.
pub struct SessionManager {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    issuer: Arc<TokenIssuer>,
    crypto: Arc<AuthCrypto>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        issuer: Arc<TokenIssuer>,
        crypto: Arc<AuthCrypto>,
    ) -> Self {
        Self {
            accounts,
            sessions,
            issuer,
            crypto,
        }
    }

    /// Authenticate with email and password; issue an access token and a
    /// fresh refresh-token session.
    ///
    /// Absent account, wrong password, and inactive account all map to
    /// the same `InvalidCredentials` so the response does not reveal
    /// which precondition failed.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        origin_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(AuthToken, AccountRecord), AuthError> {
        let email = normalize_email(email);

        let Some(mut account) = self.accounts.find_by_email(&email).await? else {
            warn!("login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if account
            .verify_credentials(password, &self.crypto)
            .is_err()
        {
            warn!(account_id = %account.id, "failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        account.record_login();
        self.accounts.save(&account).await?;

        let refresh = self
            .issuer
            .issue_refresh_token()
            .map_err(|err| AuthError::ServiceUnavailable(err.into()))?;

        let tokens = self
            .open_session(account.id, account.role, refresh, origin_ip, user_agent)
            .await?;

        info!(account_id = %account.id, "login succeeded");

        Ok((tokens, account))
    }

    /// Exchange a refresh token for a new access/refresh pair (rotation).
    ///
    /// The consumed session is revoked by a conditional update before its
    /// successor is inserted; of two concurrent calls presenting the same
    /// token exactly one wins and the loser observes
    /// `InvalidRefreshToken`. Presenting a token that was already rotated
    /// away is treated as theft evidence: the whole family is revoked.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        origin_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AuthToken, AuthError> {
        let token_hash = self.crypto.hash_token(refresh_token);

        let record = self
            .sessions
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if record.revoked {
            if record.revoked_reason == Some(RevocationReason::Rotation) {
                warn!(
                    account_id = %record.account_id,
                    family_id = %record.family_id,
                    "rotated refresh token replayed; revoking family"
                );
                self.sessions
                    .revoke_family(record.family_id, RevocationReason::ReuseDetected)
                    .await?;
            }
            return Err(AuthError::InvalidRefreshToken);
        }

        if record.is_expired_at(Utc::now()) {
            return Err(AuthError::InvalidRefreshToken);
        }

        // The compare-and-swap: only the caller that flips the row owns
        // the rotation.
        if !self
            .sessions
            .revoke_if_active(record.id, RevocationReason::Rotation)
            .await?
        {
            return Err(AuthError::InvalidRefreshToken);
        }

        let account = self
            .accounts
            .find_by_id(record.account_id)
            .await?
            .filter(|account| account.is_active)
            .ok_or(AuthError::InvalidRefreshToken)?;

        let successor = self
            .issuer
            .rotate_refresh_token(record.family_id, record.generation)
            .map_err(|err| AuthError::ServiceUnavailable(err.into()))?;

        let tokens = self
            .open_session(account.id, account.role, successor, origin_ip, user_agent)
            .await?;

        info!(
            account_id = %account.id,
            family_id = %record.family_id,
            generation = record.generation + 1,
            "refresh token rotated"
        );

        Ok(tokens)
    }

    /// Revoke one session (token supplied) or every session of the
    /// account (token omitted).
    ///
    /// Idempotent: unknown tokens and tokens owned by other accounts are
    /// ignored rather than reported.
    pub async fn logout(
        &self,
        account_id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        match refresh_token {
            Some(token) => {
                let token_hash = self.crypto.hash_token(token);

                if let Some(record) = self.sessions.find_by_token_hash(&token_hash).await?
                    && record.account_id == account_id
                {
                    self.sessions
                        .revoke_if_active(record.id, RevocationReason::Logout)
                        .await?;
                }
            }
            None => {
                let revoked = self
                    .sessions
                    .revoke_for_account(account_id, RevocationReason::LogoutAll)
                    .await?;
                info!(%account_id, revoked_sessions = revoked, "logged out everywhere");
            }
        }

        Ok(())
    }

    /// Drop session rows past their expiry. Advisory housekeeping;
    /// expiry is always re-checked at read time.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        Ok(self.sessions.purge_expired(Utc::now()).await?)
    }

    async fn open_session(
        &self,
        account_id: Uuid,
        role: Role,
        refresh: RefreshToken,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AuthToken, AuthError> {
        let access_token = self.issuer.issue_access_token(account_id, role)?;

        let record = SessionRecord {
            id: Uuid::now_v7(),
            account_id,
            token_hash: self.crypto.hash_token(refresh.as_str()),
            family_id: refresh.family_id(),
            generation: refresh.generation(),
            ip_address,
            user_agent,
            created_at: refresh.issued_at(),
            expires_at: refresh.expires_at(),
            revoked: false,
            revoked_reason: None,
            revoked_at: None,
        };
        self.sessions.insert(&record).await?;

        Ok(AuthToken {
            access_token,
            refresh_token: refresh.as_str().to_string(),
            expires_in: self.issuer.access_token_lifetime_secs(),
        })
    }
}

/// Periodic sweep deleting expired session rows.
///
/// Spawn this on the runtime if housekeeping is wanted; correctness does
/// not depend on it.
pub async fn run_expiry_sweep(manager: Arc<SessionManager>, period: std::time::Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match manager.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => info!(purged, "expired sessions purged"),
            Err(err) => warn!(error = %err, "session expiry sweep failed"),
        }
    }
}
