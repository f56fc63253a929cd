//! Bearer token issuing and verification.
//!
//! Tokens are HMAC-signed JWTs. Verification refuses every non-HMAC `alg`
//! and checks the validity window itself so that `[nbf, exp)` holds exactly,
//! with no leeway.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

/// Algorithm used for newly issued tokens.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Signed payload of a bearer token. Timestamps are epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: Vec<String>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    /// The user id named by the subject. Only positive ids are accepted.
    pub fn user_id(&self) -> Result<i64, TokenError> {
        match self.sub.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(TokenError::Malformed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad token signature")]
    BadSignature,
    #[error("token expired or not yet valid")]
    Expired,
    #[error("token issuer mismatch")]
    IssuerMismatch,
    #[error("token signing failed")]
    Signing,
}

impl TokenError {
    /// Short label used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::Expired => "expired",
            TokenError::IssuerMismatch => "issuer_mismatch",
            TokenError::Signing => "signing",
        }
    }
}

/// Issues and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_secs: i64,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // Registered claims are checked in `check_claims` against an explicit clock.
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            ttl_secs: i64::try_from(config.token_ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Issue a token for `user_id`, valid from now for the configured lifetime.
    pub fn issue(&self, user_id: i64) -> Result<String, TokenError> {
        self.issue_at(user_id, now())
    }

    pub fn issue_at(&self, user_id: i64, now: i64) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: vec![self.issuer.clone()],
            iat: now,
            nbf: now,
            exp: now.saturating_add(self.ttl_secs),
        };

        jsonwebtoken::encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to sign token");
                TokenError::Signing
            })
    }

    /// Verify a token against the wall clock.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, now())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::InvalidKeyFormat => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })?;

        self.check_claims(data.claims, now)
    }

    fn check_claims(&self, claims: Claims, now: i64) -> Result<Claims, TokenError> {
        // The window is checked first: a token past its expiry is expired
        // whatever else is wrong with it.
        if now < claims.nbf || now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.iss != self.issuer {
            return Err(TokenError::IssuerMismatch);
        }
        if claims.sub.is_empty() || !claims.aud.iter().any(|a| a == &self.issuer) {
            return Err(TokenError::Malformed);
        }
        claims.user_id()?;
        Ok(claims)
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
