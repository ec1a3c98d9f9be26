//! Store traits consumed by the managers.
//!
//! Accounts and sessions are mutated only through the lifecycle and
//! session managers; these traits are the whole surface they need. Every
//! method is a potential suspension point and may interleave with other
//! requests for the same account.

#[cfg(feature = "database")]
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::account::AccountRecord;
use crate::session::{RevocationReason, SessionRecord};

/// Failure modes of [`AccountStore::insert`].
///
/// Duplicate email is typed so the concurrent-register race resolves at
/// the store's unique index rather than at a racy pre-check.
#[derive(Debug, Error)]
pub enum InsertAccountError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Persisted account records, keyed by id, email, and token digests.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert(&self, account: &AccountRecord) -> Result<(), InsertAccountError>;
    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<AccountRecord>>;
    /// Lookup by normalized (lowercase) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>>;
    /// Lookup by the digest of an unexpended verification token.
    async fn find_by_verification_token(&self, token_hash: &str)
    -> Result<Option<AccountRecord>>;
    /// Lookup by reset-token digest. Expiry is the caller's check; the
    /// store only matches the digest.
    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<AccountRecord>>;
    async fn save(&self, account: &AccountRecord) -> Result<()>;
}

/// Persisted refresh-token session rows.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &SessionRecord) -> Result<()>;
    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<SessionRecord>>;

    /// Conditionally revoke: flips `revoked` only if it is still false and
    /// reports whether *this* call performed the transition. Two
    /// concurrent refreshes of one token both reach this point; exactly
    /// one sees `true` and owns the rotation.
    async fn revoke_if_active(&self, session_id: Uuid, reason: RevocationReason) -> Result<bool>;

    /// Revoke every active session in a rotation family. Returns the
    /// number of rows transitioned.
    async fn revoke_family(&self, family_id: Uuid, reason: RevocationReason) -> Result<u64>;

    /// Revoke every active session of an account. Returns the number of
    /// rows transitioned.
    async fn revoke_for_account(
        &self,
        account_id: Uuid,
        reason: RevocationReason,
    ) -> Result<u64>;

    /// Delete rows past their expiry. Advisory housekeeping; activity is
    /// always re-checked at read time.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
