//! Core library for the Keygate authentication platform.
//!
//! Keygate owns the full authentication and session lifecycle: account
//! registration, credential verification, access/refresh token issuance,
//! refresh-token rotation, revocation, email verification, and password
//! reset/change.
//!
//! ## Token model
//!
//! Two deliberately distinct credential kinds:
//!
//! - **Access tokens** are signed JWTs carrying subject and role claims.
//!   Any consumer can verify them cryptographically without a store
//!   round-trip; they expire quickly (15 minutes by default).
//! - **Refresh tokens** are opaque high-entropy secrets. Possession alone
//!   proves nothing: the session store row is authoritative, which is what
//!   makes them revocable. Each use rotates the token; the consumed row is
//!   revoked in the same operation that creates its successor.
//!
//! ## Security
//!
//! - Passwords are hashed with Argon2id and a server-side pepper.
//! - Bearer tokens (refresh, verification, reset) are high-entropy secrets
//!   hashed with HMAC-SHA-256 before persistence; raw values never touch
//!   the store.
//! - Rotation is guarded by a conditional revoke so concurrent replays of
//!   the same refresh token admit exactly one winner.
//!
//! The HTTP surface, persistence engine, and outbound delivery are the
//! embedding application's concern; [`facade::AuthFacade`] is the single
//! entry point this crate exposes to them.
#![allow(missing_docs)]

pub mod account;
pub mod config;
pub mod crypto;
pub mod error;
pub mod facade;
pub mod policy;
pub mod repository;
pub mod session;
pub mod token;

pub use account::lifecycle::{AccountLifecycleManager, RegisteredAccount, TokenNotifier};
pub use config::{AuthConfig, TokenConfig};
pub use crypto::{AuthCrypto, AuthCryptoError};
pub use error::AuthError;
pub use facade::AuthFacade;
pub use session::manager::SessionManager;
pub use token::{RefreshToken, TokenIssuer};
