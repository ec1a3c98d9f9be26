//! End-to-end authentication harness for integration tests.
//!
//! The stores here are in-memory mutexed maps implementing the same
//! traits the Postgres stores implement, so the whole facade runs without
//! a database. The notifier captures every token issued for out-of-band
//! delivery, which is how tests get hold of verification/reset tokens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use argon2::ParamsBuilder;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keygate_core::account::AccountRecord;
use keygate_core::account::lifecycle::{AccountLifecycleManager, TokenNotifier};
use keygate_core::config::{AuthConfig, TokenConfig};
use keygate_core::crypto::AuthCrypto;
use keygate_core::facade::AuthFacade;
use keygate_core::repository::{AccountStore, InsertAccountError, SessionStore};
use keygate_core::session::manager::SessionManager;
use keygate_core::session::{RevocationReason, SessionRecord};
use keygate_core::token::TokenIssuer;

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    rows: Mutex<HashMap<Uuid, AccountRecord>>,
}

impl MemoryAccountStore {
    fn find_where<F>(&self, predicate: F) -> Option<AccountRecord>
    where
        F: Fn(&AccountRecord) -> bool,
    {
        self.rows
            .lock()
            .unwrap()
            .values()
            .find(|row| predicate(row))
            .cloned()
    }

    /// Synchronous peek for assertions.
    pub fn find_where_email(&self, email: &str) -> Option<AccountRecord> {
        self.find_where(|row| row.email == email)
    }

    /// Overwrite a row directly, bypassing the manager invariants.
    pub fn put(&self, account: AccountRecord) {
        self.rows.lock().unwrap().insert(account.id, account);
    }

    /// Rewind a stored reset token's expiry, as if its window had passed.
    pub fn backdate_reset_token(&self, email: &str, expires_at: DateTime<Utc>) {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .values_mut()
            .find(|row| row.email == email)
            .expect("account exists");
        row.reset_token_expires_at = Some(expires_at);
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert(&self, account: &AccountRecord) -> Result<(), InsertAccountError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|row| row.email == account.email) {
            return Err(InsertAccountError::DuplicateEmail);
        }
        rows.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<AccountRecord>> {
        Ok(self.rows.lock().unwrap().get(&account_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>> {
        Ok(self.find_where(|row| row.email == email))
    }

    async fn find_by_verification_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<AccountRecord>> {
        Ok(self.find_where(|row| {
            row.verification_token_hash.as_deref() == Some(token_hash)
        }))
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<AccountRecord>> {
        Ok(self.find_where(|row| row.reset_token_hash.as_deref() == Some(token_hash)))
    }

    async fn save(&self, account: &AccountRecord) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(account.id, account.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    rows: Mutex<HashMap<Uuid, SessionRecord>>,
}

impl MemorySessionStore {
    /// Synchronous peek for assertions.
    pub fn find_by_hash(&self, token_hash: &str) -> Option<SessionRecord> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .find(|row| row.token_hash == token_hash)
            .cloned()
    }

    /// Rewind a session's expiry, as if its lifetime had elapsed.
    pub fn backdate_session(&self, token_hash: &str, expires_at: DateTime<Utc>) {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .values_mut()
            .find(|row| row.token_hash == token_hash)
            .expect("session exists");
        row.expires_at = expires_at;
    }

    pub fn active_count(&self, account_id: Uuid) -> usize {
        let now = Utc::now();
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.account_id == account_id && row.is_active_at(now))
            .count()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &SessionRecord) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|row| row.token_hash == token_hash)
            .cloned())
    }

    async fn revoke_if_active(
        &self,
        session_id: Uuid,
        reason: RevocationReason,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(&session_id) else {
            return Ok(false);
        };

        if row.revoked {
            return Ok(false);
        }

        row.revoked = true;
        row.revoked_reason = Some(reason);
        row.revoked_at = Some(Utc::now());
        Ok(true)
    }

    async fn revoke_family(&self, family_id: Uuid, reason: RevocationReason) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut transitioned = 0;
        for row in rows.values_mut() {
            if row.family_id == family_id && !row.revoked {
                row.revoked = true;
                row.revoked_reason = Some(reason);
                row.revoked_at = Some(Utc::now());
                transitioned += 1;
            }
        }
        Ok(transitioned)
    }

    async fn revoke_for_account(
        &self,
        account_id: Uuid,
        reason: RevocationReason,
    ) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut transitioned = 0;
        for row in rows.values_mut() {
            if row.account_id == account_id && !row.revoked {
                row.revoked = true;
                row.revoked_reason = Some(reason);
                row.revoked_at = Some(Utc::now());
                transitioned += 1;
            }
        }
        Ok(transitioned)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, row| !row.is_expired_at(now));
        Ok((before - rows.len()) as u64)
    }
}

/// Captures tokens handed to the out-of-band delivery channel.
#[derive(Debug, Default)]
pub struct CapturingNotifier {
    verification: Mutex<Vec<(String, String)>>,
    reset: Mutex<Vec<(String, String)>>,
}

impl CapturingNotifier {
    pub fn last_verification_token(&self) -> Option<String> {
        self.verification
            .lock()
            .unwrap()
            .last()
            .map(|(_, token)| token.clone())
    }

    pub fn last_reset_token(&self) -> Option<String> {
        self.reset.lock().unwrap().last().map(|(_, token)| token.clone())
    }

    pub fn reset_token_count(&self) -> usize {
        self.reset.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenNotifier for CapturingNotifier {
    async fn verification_token_issued(&self, email: &str, token: &str) -> Result<()> {
        self.verification
            .lock()
            .unwrap()
            .push((email.to_string(), token.to_string()));
        Ok(())
    }

    async fn reset_token_issued(&self, email: &str, token: &str) -> Result<()> {
        self.reset
            .lock()
            .unwrap()
            .push((email.to_string(), token.to_string()));
        Ok(())
    }
}

/// Fully wired facade over in-memory stores.
pub struct TestAuthHarness {
    pub facade: AuthFacade,
    pub accounts: Arc<MemoryAccountStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub outbox: Arc<CapturingNotifier>,
    pub crypto: Arc<AuthCrypto>,
}

impl TestAuthHarness {
    pub fn new() -> Self {
        Self::with_auth_config(AuthConfig::default())
    }

    pub fn with_auth_config(config: AuthConfig) -> Self {
        // Minimal Argon2 cost so the suite stays quick.
        let params = ParamsBuilder::new()
            .m_cost(8)
            .t_cost(1)
            .p_cost(1)
            .output_len(32)
            .build()
            .unwrap();
        let crypto =
            Arc::new(AuthCrypto::with_params("test-pepper", "test-token-key", params).unwrap());

        let issuer = Arc::new(TokenIssuer::new(TokenConfig::new(
            "test_secret_key_for_testing_only",
        )));

        let accounts = Arc::new(MemoryAccountStore::default());
        let sessions = Arc::new(MemorySessionStore::default());
        let outbox = Arc::new(CapturingNotifier::default());

        let account_store: Arc<dyn AccountStore> = accounts.clone();
        let session_store: Arc<dyn SessionStore> = sessions.clone();

        let lifecycle = Arc::new(
            AccountLifecycleManager::new(
                account_store.clone(),
                session_store.clone(),
                crypto.clone(),
                config,
            )
            .with_notifier(outbox.clone()),
        );

        let session_manager = Arc::new(SessionManager::new(
            account_store,
            session_store,
            issuer.clone(),
            crypto.clone(),
        ));

        let facade = AuthFacade::new(lifecycle, session_manager, issuer);

        Self {
            facade,
            accounts,
            sessions,
            outbox,
            crypto,
        }
    }

    pub fn token_hash(&self, token: &str) -> String {
        self.crypto.hash_token(token)
    }
}
