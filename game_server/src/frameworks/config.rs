use std::{env, time::Duration};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DbSettings {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub db: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_pool_size() -> u32 {
    5
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
    pub in_game_cache_expire_time: u64,
    pub result_cache_expire_time: u64,
}

impl RedisSettings {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmqpSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub vhost: String,
    #[serde(default = "default_prefetch")]
    pub prefetch_count: u16,
}

fn default_prefetch() -> u16 {
    16
}

impl AmqpSettings {
    pub fn url(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.vhost
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameSettings {
    pub start_countdown: i64,
    pub lobby_countdown: i64,
    pub player_limit: i64,
    pub cleanup_countdown: i64,
    pub word_file: String,
    #[serde(default)]
    pub suppress_keystroke_echo: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenSettings {
    pub public_key_path: String,
    pub private_key_path: String,
    pub refresh_endpoint: String,
    pub access_duration: i64,
    pub refresh_duration: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BgSettings {
    pub ping_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db: DbSettings,
    pub redis: RedisSettings,
    pub amqp: AmqpSettings,
    pub game: GameSettings,
    pub token: TokenSettings,
    pub server: ServerSettings,
    #[serde(default)]
    pub cors: CorsSettings,
    pub front_end_endpoint: String,
    pub error_redirect: String,
    pub server_name: String,
    pub bg: BgSettings,
}

impl Settings {
    /// Loads `TYPEPHOON_CONFIG` (default `config/default.toml`), then applies
    /// a handful of environment overrides for values that commonly vary per
    /// deployment but are awkward to template into a committed file.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("TYPEPHOON_CONFIG").unwrap_or_else(|_| "config/default.toml".into());
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
        let mut settings: Settings = toml::from_str(&raw).map_err(ConfigError::Parse)?;

        if let Ok(name) = env::var("SERVER_NAME") {
            settings.server_name = name;
        }
        if let Ok(port) = env::var("SERVER_PORT").ok().and_then(|v| v.parse().ok()) {
            settings.server.port = port;
        }
        if let Ok(host) = env::var("DB_HOST") {
            settings.db.host = host;
        }
        if let Ok(host) = env::var("REDIS_HOST") {
            settings.redis.host = host;
        }
        if let Ok(host) = env::var("AMQP_HOST") {
            settings.amqp.host = host;
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

pub fn readiness_probe_timeout() -> Duration {
    Duration::from_millis(100)
}
