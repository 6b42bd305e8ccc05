//! JWT token issuance and verification
//!
//! HS256-signed access tokens carrying `{iss, sub, iat, exp}`. Every token is
//! valid for exactly [`TOKEN_TTL_SECS`] from issuance. The signing secret is
//! handed to [`JwtService::new`] once and held for the lifetime of the
//! service.

use blog_core::UserId;
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access token lifetime: 24 hours
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - numeric user ID as a string
    pub sub: String,
    /// Issued at (Unix epoch seconds)
    pub iat: i64,
    /// Expiration (Unix epoch seconds)
    pub exp: i64,
}

/// Token verification errors
///
/// The variants are distinct for logging. Clients only ever see a generic
/// 401.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    BadSignature,
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Unix epoch seconds
    pub expires_at: i64,
}

/// The typed payload of a token that passed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: UserId,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Issues and verifies access tokens with a single immutable secret
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is checked in `verify_at` so the boundary is exact
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            validation,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token for `user_id`, valid for 24 hours from now
    pub fn issue(&self, user_id: UserId) -> Result<IssuedToken, JwtError> {
        self.issue_at(user_id, Utc::now().timestamp())
    }

    /// Issue a token as of the Unix time `now`
    pub fn issue_at(&self, user_id: UserId, now: i64) -> Result<IssuedToken, JwtError> {
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Verify a token against the current time
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, JwtError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as of the Unix time `now`
    ///
    /// A token is expired from the second `exp` is reached.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedToken, JwtError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => JwtError::BadSignature,
                _ => JwtError::Malformed(e.to_string()),
            }
        })?;
        let claims = data.claims;

        if now >= claims.exp {
            return Err(JwtError::Expired);
        }

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| JwtError::Malformed("subject is not a numeric user id".to_string()))?;

        Ok(VerifiedToken {
            user_id,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.issuer)
            .field("secret", &"<redacted>")
            .finish()
    }
}
