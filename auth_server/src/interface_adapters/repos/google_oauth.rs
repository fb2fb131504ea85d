//! Google code-exchange and ID-token verification. Grounded in
//! `original_source/src/typephoon_api/lib/oauth_providers/google.py`: trade
//! the authorization code for an `id_token`, then verify it against
//! Google's published JWKS (cached for a minute, same TTL the original
//! used) rather than trusting the token unsigned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::domain::errors::AuthError;
use crate::use_cases::oauth_login::ProviderProfile;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const CERTS_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/certs";
const JWKS_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    name: String,
}

struct CachedJwks {
    fetched_at: Instant,
    jwks: Jwks,
}

pub struct GoogleOauthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    jwks_cache: Mutex<Option<CachedJwks>>,
}

impl GoogleOauthClient {
    pub fn new(client_id: String, client_secret: String, redirect_url: String) -> Arc<Self> {
        Arc::new(Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            redirect_url,
            jwks_cache: Mutex::new(None),
        })
    }

    pub async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, AuthError> {
        let params = [
            ("code", code),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_url),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "google token exchange request failed");
                AuthError::Unknown
            })?
            .json::<TokenResponse>()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "google token exchange response malformed");
                AuthError::Unknown
            })?;

        self.verify_id_token(&response.id_token).await
    }

    async fn verify_id_token(&self, id_token: &str) -> Result<ProviderProfile, AuthError> {
        let header = decode_header(id_token).map_err(|_| AuthError::InvalidToken)?;
        let kid = header.kid.ok_or(AuthError::InvalidToken)?;

        let jwks = self.fetch_jwks().await?;
        let key = jwks
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or(AuthError::InvalidToken)?;

        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e).map_err(|_| AuthError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;

        let data = decode::<GoogleClaims>(id_token, &decoding_key, &validation).map_err(|_| AuthError::InvalidToken)?;

        Ok(ProviderProfile {
            provider: "google",
            provider_uid: data.claims.sub,
            name: data.claims.name,
        })
    }

    async fn fetch_jwks(&self) -> Result<Jwks, AuthError> {
        let mut cache = self.jwks_cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < JWKS_TTL {
                return Ok(cached.jwks.clone());
            }
        }

        let jwks = self
            .http
            .get(CERTS_ENDPOINT)
            .send()
            .await
            .map_err(|_| AuthError::Unknown)?
            .json::<Jwks>()
            .await
            .map_err(|_| AuthError::Unknown)?;

        *cache = Some(CachedJwks { fetched_at: Instant::now(), jwks: jwks.clone() });
        Ok(jwks)
    }
}
