use std::time::Duration;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::config::JwtConfig;

/// Registered claim names the issuer owns. Extra claims may not use them.
pub const RESERVED_CLAIMS: [&str; 7] = ["iss", "sub", "aud", "exp", "nbf", "iat", "jti"];

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("claim {0:?} is reserved")]
    ReservedClaim(String),
    #[error("jwt encode failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// JWT payload: the standard fields plus caller supplied claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Mints signed, time-bounded tokens for an authenticated subject.
pub trait TokenIssuer: Send + Sync {
    fn issue(
        &self,
        subject: &str,
        ttl: Duration,
        extra: Map<String, Value>,
    ) -> Result<String, TokenError>;
}

/// HS256 issuer keyed by a shared secret.
#[derive(Clone)]
pub struct JwtIssuer {
    encoding: EncodingKey,
    issuer: String,
}

impl JwtIssuer {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        }
    }

    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self::new(&cfg.secret, cfg.issuer.clone())
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(
        &self,
        subject: &str,
        ttl: Duration,
        extra: Map<String, Value>,
    ) -> Result<String, TokenError> {
        if let Some(key) = extra.keys().find(|k| RESERVED_CLAIMS.contains(&k.as_str())) {
            return Err(TokenError::ReservedClaim(key.clone()));
        }

        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject.to_owned(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            extra,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(subject = %subject, exp = claims.exp, "jwt signed");
        Ok(token)
    }
}
