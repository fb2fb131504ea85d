use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DbSettings {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub db: String,
    pub pool_size: u32,
}

impl DbSettings {
    pub fn dsn(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.db
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub db: u8,
    pub expire_time: u64,
}

impl RedisSettings {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenSettings {
    pub public_key_path: String,
    pub private_key_path: String,
    pub access_duration: i64,
    pub refresh_duration: i64,
    /// Path the refresh cookie is scoped to, so it's never sent on
    /// ordinary API calls — only back to this endpoint.
    pub refresh_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db: DbSettings,
    pub redis: RedisSettings,
    pub token: TokenSettings,
    pub google: GoogleSettings,
    pub server: ServerSettings,
    pub front_end_endpoint: String,
    /// Where a failed login / callback redirects the browser to.
    pub error_redirect: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("TYPEPHOON_CONFIG").unwrap_or_else(|_| "config/default.toml".into());
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
        let mut settings: Settings = toml::from_str(&raw).map_err(ConfigError::Parse)?;

        if let Ok(port) = env::var("SERVER_PORT").ok().and_then(|v| v.parse().ok()) {
            settings.server.port = port;
        }
        if let Ok(host) = env::var("DB_HOST") {
            settings.db.host = host;
        }
        if let Ok(secret) = env::var("GOOGLE_CLIENT_SECRET") {
            settings.google.client_secret = secret;
        }

        Ok(settings)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(toml::de::Error),
}
