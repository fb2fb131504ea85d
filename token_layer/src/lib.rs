//! Access/refresh token minting and validation, shared by `auth_server`
//! (which owns the OAuth/guest login HTTP surface) and `game_server`
//! (whose QueueIn join path mints guest tokens and validates whatever
//! token a client presents, in-process, without a network hop per join).

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserType {
    Guest,
    Registered,
}

/// Claims carried by both access and refresh tokens.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwtPayload {
    pub sub: String,
    pub name: String,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    pub user_type: UserType,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        TokenError::Invalid
    }
}

#[derive(Clone, Debug)]
pub struct TokenKeys {
    pub private_key_pem: Vec<u8>,
    pub public_key_pem: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
pub struct TokenDurations {
    pub access_seconds: i64,
    pub refresh_seconds: i64,
}

/// Mints RS256-signed access/refresh token pairs.
pub struct TokenGenerator {
    keys: TokenKeys,
    durations: TokenDurations,
}

pub struct GenTokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenGenerator {
    pub fn new(keys: TokenKeys, durations: TokenDurations) -> Self {
        Self { keys, durations }
    }

    fn encode(&self, payload: &JwtPayload) -> Result<String, TokenError> {
        let key = EncodingKey::from_rsa_pem(&self.keys.private_key_pem)?;
        Ok(encode(&Header::new(Algorithm::RS256), payload, &key)?)
    }

    /// `user_type` is `GUEST` for a guest token, which reuses `refresh_duration`
    /// as its lifetime since guests never refresh.
    pub fn gen_access_token(
        &self,
        user_id: &str,
        username: &str,
        user_type: UserType,
    ) -> Result<String, TokenError> {
        let iat = Utc::now();
        let nbf = iat - Duration::seconds(1);
        let duration = match user_type {
            UserType::Guest => self.durations.refresh_seconds,
            UserType::Registered => self.durations.access_seconds,
        };
        let exp = iat + Duration::seconds(duration);
        let payload = JwtPayload {
            sub: user_id.to_string(),
            name: username.to_string(),
            exp: exp.timestamp(),
            nbf: nbf.timestamp(),
            iat: iat.timestamp(),
            user_type,
        };
        self.encode(&payload)
    }

    pub fn gen_refresh_token(&self, user_id: &str, username: &str) -> Result<String, TokenError> {
        let iat = Utc::now();
        let nbf = iat - Duration::seconds(1);
        let exp = iat + Duration::seconds(self.durations.refresh_seconds);
        let payload = JwtPayload {
            sub: user_id.to_string(),
            name: username.to_string(),
            exp: exp.timestamp(),
            nbf: nbf.timestamp(),
            iat: iat.timestamp(),
            user_type: UserType::Registered,
        };
        self.encode(&payload)
    }

    pub fn gen_token_pair(
        &self,
        user_id: &str,
        username: &str,
    ) -> Result<GenTokenPair, TokenError> {
        Ok(GenTokenPair {
            access_token: self.gen_access_token(user_id, username, UserType::Registered)?,
            refresh_token: self.gen_refresh_token(user_id, username)?,
        })
    }
}

/// Validates RS256-signed tokens minted by `TokenGenerator`.
pub struct TokenValidator {
    keys: TokenKeys,
}

impl TokenValidator {
    pub fn new(keys: TokenKeys) -> Self {
        Self { keys }
    }

    pub fn validate(&self, token: &str) -> Result<JwtPayload, TokenError> {
        let key = DecodingKey::from_rsa_pem(&self.keys.public_key_pem)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        let data = decode::<JwtPayload>(token, &key, &validation)?;
        Ok(data.claims)
    }
}

/// One-shot guest-token store: `store` returns a random key, `get` deletes on read.
#[async_trait]
pub trait GuestTokenRepo: Send + Sync {
    async fn store(&self, token: &str) -> Result<String, String>;
    async fn get(&self, key: &str) -> Result<Option<String>, String>;
}
