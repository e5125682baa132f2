use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::users::User;

/// Token secrets and lifetimes, injected at construction time
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

/// JWT claims carried by both token kinds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    pub iat: u64,
    pub exp: u64,
    /// Unique per token, so two tokens minted in the same second still differ
    pub jti: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies HS256 access and refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    config: AuthConfig,
}

impl TokenIssuer {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Mint a fresh access/refresh pair for `user`
    ///
    /// # Errors
    /// * `AuthError::Token` if signing fails
    pub fn issue(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: sign(user, &self.config.access_secret, self.config.access_ttl_secs)?,
            refresh_token: sign(user, &self.config.refresh_secret, self.config.refresh_ttl_secs)?,
        })
    }

    /// Verify an access token
    ///
    /// # Errors
    /// * `AuthError::Forbidden` if the token is malformed, expired or wrongly signed
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        verify(token, &self.config.access_secret)
            .map_err(|e| AuthError::Forbidden(format!("invalid token ({e})")))
    }

    /// Verify a refresh token's signature and expiry
    ///
    /// # Errors
    /// * `AuthError::Unauthorized` if the token does not verify
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        verify(token, &self.config.refresh_secret)
            .map_err(|e| AuthError::Unauthorized(format!("invalid refresh token ({e})")))
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.config.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.config.refresh_ttl_secs
    }
}

fn sign(user: &User, secret: &str, ttl_secs: u64) -> Result<String, AuthError> {
    let now = Utc::now().timestamp().max(0) as u64;
    let claims = Claims {
        sub: user.id.clone(),
        username: user.username.clone(),
        iat: now,
        exp: now + ttl_secs,
        jti: Uuid::new_v4().to_string(),
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

fn verify(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}
