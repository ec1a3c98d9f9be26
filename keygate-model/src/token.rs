//! Token response bundle and access-token claims.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::Role;

/// Token pair returned after a successful login or refresh.
///
/// `access_token` is a signed JWT verifiable without a store round-trip;
/// `refresh_token` is an opaque secret meaningful only against the session
/// store. The two are deliberately distinct kinds and are never unified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    /// Signed access token for API authentication
    pub access_token: String,
    /// Opaque refresh token for obtaining the next pair
    pub refresh_token: String,
    /// Seconds until the access token expires (typically 900)
    pub expires_in: u32,
}

/// JWT claims carried by access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Account ID
    pub sub: Uuid,
    /// Role held by the account at issuance time
    pub role: Role,
    /// Expiration time (Unix epoch seconds)
    pub exp: i64,
    /// Issued at (Unix epoch seconds)
    pub iat: i64,
    /// Token ID
    pub jti: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_serialize_role_as_snake_case() {
        let claims = AccessClaims {
            sub: Uuid::nil(),
            role: Role::Admin,
            exp: 0,
            iat: 0,
            jti: "token-id".to_string(),
        };

        let json = serde_json::to_value(&claims).expect("claims serialize");
        assert_eq!(json["role"], "admin");
    }
}
