//! Account-facing types: the role enumeration and the external summary view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed set of roles an account can hold.
///
/// Authorization is a pure check over this enumeration (see
/// [`is_authorized`]); the core never dispatches on roles itself, the
/// routing layer consults the check before calling in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

impl Role {
    /// Convert to the storage string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Parse from the storage string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `role` satisfies an endpoint's requirement list.
///
/// An empty requirement list means the endpoint only needs a valid access
/// token, not a particular role.
pub fn is_authorized(role: Role, required: &[Role]) -> bool {
    required.is_empty() || required.contains(&role)
}

/// External view of an account.
///
/// This is the only account shape that ever leaves the subsystem; it
/// carries no password digest and no verification/reset token material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Unique account identifier
    pub id: Uuid,
    /// Lowercase email address
    pub email: String,
    /// Display name shown in UI
    pub display_name: String,
    /// Role held by the account
    pub role: Role,
    /// Whether the email address has been confirmed
    pub is_verified: bool,
    /// Timestamp of account creation
    pub created_at: DateTime<Utc>,
}

/// Normalize an email address for storage and lookup.
///
/// Uniqueness is case-insensitive, so every store access goes through this.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_string_round_trip() {
        for role in [Role::Admin, Role::Member] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn authorization_matrix() {
        assert!(is_authorized(Role::Member, &[]));
        assert!(is_authorized(Role::Admin, &[Role::Admin]));
        assert!(is_authorized(Role::Admin, &[Role::Admin, Role::Member]));
        assert!(!is_authorized(Role::Member, &[Role::Admin]));
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
