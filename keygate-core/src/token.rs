//! Token issuance: signed access tokens and opaque refresh tokens.
//!
//! The two kinds are deliberately distinct and never unified. Access tokens
//! are verified purely cryptographically so any stateless consumer can
//! check them without a store round-trip. Refresh tokens carry no claims at
//! all; they are meaningless without their session-store row, which is what
//! makes them revocable.

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;
use uuid::Uuid;

use keygate_model::{AccessClaims, Role};

use crate::config::TokenConfig;
use crate::error::AuthError;

#[derive(Debug, Error)]
pub enum RefreshTokenError {
    #[error("invalid token format")]
    InvalidFormat,
    #[error("token generation failed")]
    GenerationFailed,
}

/// Refresh token value object handling rotation metadata.
///
/// The `family_id` ties every rotation of one login together; `generation`
/// counts the rotations. Replay of a rotated member is how theft of a
/// leaked token shows up, and the family is the revocation unit for it.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    value: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    family_id: Uuid,
    generation: u32,
}

impl RefreshToken {
    pub fn generate(lifetime: Duration) -> Result<Self, RefreshTokenError> {
        Self::generate_with_family(lifetime, Uuid::now_v7(), 1)
    }

    pub fn rotate(&self, lifetime: Duration) -> Result<Self, RefreshTokenError> {
        Self::generate_with_family(lifetime, self.family_id, self.generation + 1)
    }

    fn generate_with_family(
        lifetime: Duration,
        family_id: Uuid,
        generation: u32,
    ) -> Result<Self, RefreshTokenError> {
        let mut token_bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut token_bytes)
            .map_err(|_| RefreshTokenError::GenerationFailed)?;

        let value = URL_SAFE_NO_PAD.encode(token_bytes);
        let issued_at = Utc::now();
        let expires_at = issued_at + lifetime;

        Ok(Self {
            value,
            issued_at,
            expires_at,
            family_id,
            generation,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn family_id(&self) -> Uuid {
        self.family_id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn secure_compare(&self, other: &str) -> bool {
        let self_bytes = self.value.as_bytes();
        let other_bytes = other.as_bytes();

        if self_bytes.len() != other_bytes.len() {
            return false;
        }

        constant_time_eq(self_bytes, other_bytes)
    }
}

impl Drop for RefreshToken {
    fn drop(&mut self) {
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

/// Stateless issuer of access and refresh tokens.
///
/// All settings arrive through [`TokenConfig`] at construction; the issuer
/// never consults ambient configuration or the stores.
pub struct TokenIssuer {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_token_ttl", &self.config.access_token_ttl)
            .field("refresh_token_ttl", &self.config.refresh_token_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.signing_key.as_ref());
        let decoding_key = DecodingKey::from_secret(config.signing_key.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Seconds until a freshly issued access token expires.
    pub fn access_token_lifetime_secs(&self) -> u32 {
        self.config.access_token_ttl.num_seconds().max(0) as u32
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        self.config.refresh_token_ttl
    }

    /// Sign an access token for the given subject and role.
    pub fn issue_access_token(&self, account_id: Uuid, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.config.access_token_ttl;

        let claims = AccessClaims {
            sub: account_id,
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("failed to sign access token")
    }

    /// Verify an access token signature and expiry. Purely cryptographic;
    /// no store lookup is performed. This is the primitive the routing
    /// layer uses to enforce `Unauthorized`.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::Unauthorized)
    }

    /// Generate a fresh opaque refresh token starting a new family.
    pub fn issue_refresh_token(&self) -> Result<RefreshToken, RefreshTokenError> {
        RefreshToken::generate(self.config.refresh_token_ttl)
    }

    /// Generate the successor of a consumed refresh token (same family,
    /// next generation).
    pub fn rotate_refresh_token(
        &self,
        consumed_family: Uuid,
        consumed_generation: u32,
    ) -> Result<RefreshToken, RefreshTokenError> {
        RefreshToken::generate_with_family(
            self.config.refresh_token_ttl,
            consumed_family,
            consumed_generation + 1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(TokenConfig::new("test_secret_key_for_testing_only"))
    }

    #[test]
    fn access_token_round_trip() {
        let issuer = issuer();
        let account_id = Uuid::new_v4();

        let token = issuer
            .issue_access_token(account_id, Role::Member)
            .expect("token issues");
        assert_eq!(token.split('.').count(), 3);

        let claims = issuer.verify_access_token(&token).expect("token verifies");
        assert_eq!(claims.sub, account_id);
        assert_eq!(claims.role, Role::Member);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_expired_access_token() {
        let issuer = issuer();
        let now = Utc::now();

        let claims = AccessClaims {
            sub: Uuid::new_v4(),
            role: Role::Member,
            exp: (now - Duration::seconds(100)).timestamp(),
            iat: (now - Duration::seconds(1000)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret("test_secret_key_for_testing_only".as_ref()),
        )
        .unwrap();

        assert!(matches!(
            issuer.verify_access_token(&token),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_tampered_access_token() {
        let issuer = issuer();
        let token = issuer
            .issue_access_token(Uuid::new_v4(), Role::Admin)
            .unwrap();

        let mut tampered = token.into_bytes();
        let last = tampered.last_mut().unwrap();
        *last = if *last == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();

        assert!(matches!(
            issuer.verify_access_token(&tampered),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_token_signed_with_other_key() {
        let token = TokenIssuer::new(TokenConfig::new("other-key"))
            .issue_access_token(Uuid::new_v4(), Role::Member)
            .unwrap();

        assert!(matches!(
            issuer().verify_access_token(&token),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn generates_refresh_tokens() {
        let token = RefreshToken::generate(Duration::days(7)).unwrap();
        assert_eq!(token.generation(), 1);
        assert!(token.expires_at() > token.issued_at());
        assert!(!token.is_expired());
    }

    #[test]
    fn rotates_refresh_tokens() {
        let token = RefreshToken::generate(Duration::days(7)).unwrap();
        let rotated = token.rotate(Duration::days(7)).unwrap();
        assert_eq!(token.family_id(), rotated.family_id());
        assert_eq!(rotated.generation(), token.generation() + 1);
        assert!(!rotated.secure_compare(token.as_str()));
    }
}
