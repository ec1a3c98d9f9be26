//! Session records backing opaque refresh tokens.
//!
//! One row per issued, not-yet-rotated refresh token. Rows move one way:
//! active, then revoked (rotation, logout, credential change, reuse
//! detection) or dead by expiry. There is no reactivate transition;
//! revocation only ever flips false to true.

pub mod manager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a session was revoked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RevocationReason {
    /// Consumed by a successful refresh; a successor row exists.
    #[serde(rename = "rotation")]
    Rotation,
    /// Explicit logout of this one session.
    #[serde(rename = "logout")]
    Logout,
    /// Logout of every session the account held.
    #[serde(rename = "logout_all")]
    LogoutAll,
    /// Password changed with the current password.
    #[serde(rename = "password_change")]
    PasswordChange,
    /// Password replaced through the reset-token flow.
    #[serde(rename = "password_reset")]
    PasswordReset,
    /// An already-rotated token was presented again.
    #[serde(rename = "reuse_detected")]
    ReuseDetected,
}

impl RevocationReason {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotation => "rotation",
            Self::Logout => "logout",
            Self::LogoutAll => "logout_all",
            Self::PasswordChange => "password_change",
            Self::PasswordReset => "password_reset",
            Self::ReuseDetected => "reuse_detected",
        }
    }

    /// Parse from database string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rotation" => Some(Self::Rotation),
            "logout" => Some(Self::Logout),
            "logout_all" => Some(Self::LogoutAll),
            "password_change" => Some(Self::PasswordChange),
            "password_reset" => Some(Self::PasswordReset),
            "reuse_detected" => Some(Self::ReuseDetected),
            _ => None,
        }
    }
}

/// Persisted refresh-token session row.
///
/// `token_hash` is the HMAC digest of the opaque token; the raw value is
/// never stored. `ip_address` and `user_agent` are advisory issuance
/// metadata, not security inputs.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token_hash: String,
    pub family_id: Uuid,
    pub generation: u32,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_reason: Option<RevocationReason>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// A session is active only while unrevoked and unexpired. Expiry is
    /// enforced here, at read time, so correctness never depends on the
    /// background sweep.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }
}
