//! JWT issuing and verification
//!
//! Access and refresh tokens are HS256-signed with separate secrets, so a
//! refresh token is never accepted as an access token or the reverse.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Freshly issued access + refresh tokens
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

struct Keys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

#[derive(Clone)]
pub struct TokenService {
    keys: Arc<Keys>,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            keys: Arc::new(Keys {
                access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
                access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
                refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
                refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            }),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn issue_pair(&self, user_id: &str, email: &str, role: &str) -> Result<TokenPair, ApiError> {
        let iat = Utc::now().timestamp();
        let claims = |ttl: i64| Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            exp: iat.saturating_add(ttl),
            iat,
        };

        let header = Header::new(Algorithm::HS256);
        let sign = |claims: &Claims, key: &EncodingKey| {
            encode(&header, claims, key).map_err(|e| {
                tracing::error!("Failed to sign token: {}", e);
                ApiError::internal("Failed to generate token")
            })
        };

        Ok(TokenPair {
            access_token: sign(&claims(self.access_ttl_secs), &self.keys.access_encoding)?,
            refresh_token: sign(&claims(self.refresh_ttl_secs), &self.keys.refresh_encoding)?,
            expires_in: self.access_ttl_secs,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, ApiError> {
        Self::verify(token, &self.keys.access_decoding).map_err(|e| {
            tracing::debug!("Rejected access token: {}", e);
            ApiError::unauthorized("Invalid token")
        })
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, ApiError> {
        Self::verify(token, &self.keys.refresh_decoding).map_err(|e| {
            tracing::debug!("Rejected refresh token: {}", e);
            ApiError::unauthorized("Invalid refresh token")
        })
    }

    fn verify(token: &str, key: &DecodingKey) -> jsonwebtoken::errors::Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, key, &validation).map(|data| data.claims)
    }
}
