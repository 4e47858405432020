//! Identity token codec
//!
//! Tokens are HS256-signed JWTs whose `iss` claim carries the identity id as
//! a decimal string. A token is valid from its issue time (`nbf == iat`) until
//! `exp`; verification applies no leeway on either bound.

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::IdentityId;

/// Default token lifetime: 24 hours
pub const DEFAULT_TOKEN_EXPIRY: u64 = 24 * 60 * 60;

/// Longest accepted token lifetime: 30 days
pub const MAX_TOKEN_EXPIRY: u64 = 30 * DEFAULT_TOKEN_EXPIRY;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret
    pub secret: String,
    /// Token expiration time in seconds (default: 24 hours)
    pub token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: HMAC signing secret (required)
    /// - `JWT_TOKEN_EXPIRY`: Token expiry in seconds, 1 to 2592000 (default: 86400)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
        if secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let token_expiry = match std::env::var("JWT_TOKEN_EXPIRY") {
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|expiry| (1..=MAX_TOKEN_EXPIRY).contains(expiry))
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "JWT_TOKEN_EXPIRY must be between 1 and {} seconds, got {:?}",
                        MAX_TOKEN_EXPIRY,
                        raw
                    )
                })?,
            Err(_) => DEFAULT_TOKEN_EXPIRY,
        };

        Ok(JwtConfig {
            secret,
            token_expiry,
        })
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id, decimal
    pub iss: String,
    pub sub: String,
    pub jti: String,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
}

/// Reasons a token is rejected or cannot be produced
#[derive(Error, Debug)]
pub enum TokenError {
    /// No token was presented
    #[error("missing authorization token")]
    Missing,

    /// Signature, structure or validity window check failed
    #[error("invalid token: {0}")]
    Rejected(#[source] jsonwebtoken::errors::Error),

    /// The issuer claim is not a positive identity id
    #[error("invalid token issuer: {0:?}")]
    InvalidIssuer(String),

    /// Signing failed
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// The configured lifetime does not fit after the issue time
    #[error("token lifetime overflows the expiry timestamp")]
    Lifetime,
}

/// Token codec keyed by the configured secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_expiry: u64,
}

impl TokenCodec {
    /// Build a codec from its configuration
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iss"]);

        TokenCodec {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            token_expiry: config.token_expiry,
        }
    }

    /// Issue a token for `identity_id`, valid from now
    pub fn issue(&self, identity_id: IdentityId) -> Result<String, TokenError> {
        self.issue_at(identity_id, Utc::now().timestamp().max(0) as u64)
    }

    /// Issue a token whose validity window starts at `issued_at` (unix seconds)
    pub fn issue_at(&self, identity_id: IdentityId, issued_at: u64) -> Result<String, TokenError> {
        let exp = issued_at
            .checked_add(self.token_expiry)
            .ok_or(TokenError::Lifetime)?;

        let claims = Claims {
            iss: identity_id.to_string(),
            sub: "authorized".to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at,
            nbf: issued_at,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Verify a token and return the identity id it asserts
    pub fn verify(&self, token: &str) -> Result<IdentityId, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(TokenError::Rejected)?;

        match data.claims.iss.parse::<IdentityId>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(TokenError::InvalidIssuer(data.claims.iss)),
        }
    }

    /// Token lifetime in seconds
    pub fn token_expiry(&self) -> u64 {
        self.token_expiry
    }
}
