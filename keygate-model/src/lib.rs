//! Shared data model definitions for the Keygate authentication platform.
//!
//! Everything here is transport-agnostic: the request/response DTOs, the
//! role enumeration, and the access-token claims are consumed both by
//! `keygate-core` and by whatever routing layer embeds it.
#![allow(missing_docs)]

pub mod account;
pub mod request;
pub mod token;

// Intentionally curated re-exports for downstream consumers.
pub use account::{AccountSummary, Role, is_authorized, normalize_email};
pub use request::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, ValidationError,
};
pub use token::{AccessClaims, AuthToken};
