//! Stateless authentication tokens
//!
//! HS256 JWTs carrying the user id and the issue time. Validity depends only
//! on the signature and on `now - iat` staying within the TTL, so any process
//! holding the same secret can issue and verify tokens.

use crate::error::TokenError;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lifetime of an issued token
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 12);

/// Token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Issued at (unix seconds)
    pub iat: i64,

    /// Expiration hint for clients; verification goes by `iat`
    pub exp: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &Secret<String>, ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();

        // Expiry is checked against iat below, without leeway
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user_id` stamped with the current time
    pub fn issue(&self, user_id: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, Utc::now().timestamp())
    }

    pub fn issue_at(&self, user_id: &str, issued_at: i64) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl.as_secs() as i64),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode token: {:?}", e);
            TokenError::Signing(e.to_string())
        })
    }

    /// Verify a token and return the embedded user id
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Result<String, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                TokenError::Invalid
            })?
            .claims;

        if claims.sub.is_empty() {
            return Err(TokenError::Invalid);
        }

        if now.saturating_sub(claims.iat) > self.ttl.as_secs() as i64 {
            tracing::debug!(user_id = %claims.sub, iat = claims.iat, "Token expired");
            return Err(TokenError::Expired);
        }

        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            &Secret::new("test_secret_key_32_characters_long!".to_string()),
            DEFAULT_TOKEN_TTL,
        )
    }

    #[test]
    fn test_issue_and_verify() {
        let service = service();
        let token = service.issue("123").unwrap();
        assert_eq!(service.verify(&token).unwrap(), "123");
    }

    #[test]
    fn test_expired_token() {
        let service = service();
        let ttl = DEFAULT_TOKEN_TTL.as_secs() as i64;
        let token = service.issue_at("123", 1_000_000).unwrap();

        assert_eq!(service.verify_at(&token, 1_000_000 + ttl).unwrap(), "123");
        assert_eq!(
            service.verify_at(&token, 1_000_000 + ttl + 1),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_tampered_signature() {
        let service = service();
        let token = service.issue("123").unwrap();

        let (head, signature) = token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { 'B' } else { 'A' };
        let tampered = format!("{head}.{flipped}{}", &signature[1..]);

        assert_eq!(service.verify(&tampered), Err(TokenError::Invalid));
    }

    #[test]
    fn test_tampered_payload() {
        let service = service();
        let token = service.issue("123").unwrap();
        let other = service.issue("456").unwrap();

        // Signature of one token over the payload of another
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(service.verify(&spliced), Err(TokenError::Invalid));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let other = TokenService::new(
            &Secret::new("another_secret_key_32_characters!!".to_string()),
            DEFAULT_TOKEN_TTL,
        );
        let token = other.issue("123").unwrap();
        assert_eq!(service().verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_shared_secret_across_instances() {
        let token = service().issue("123").unwrap();
        assert_eq!(service().verify(&token).unwrap(), "123");
    }

    #[test]
    fn test_garbage_rejected() {
        let service = service();
        assert_eq!(service.verify(""), Err(TokenError::Invalid));
        assert_eq!(service.verify("not.a.token"), Err(TokenError::Invalid));
        assert_eq!(service.verify("bm90IGEgdG9rZW4"), Err(TokenError::Invalid));
    }
}
