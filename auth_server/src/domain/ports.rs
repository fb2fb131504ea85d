use async_trait::async_trait;

use crate::domain::entities::{User, UserType};

/// Persistent user store: register-on-first-login, look up, refresh token bookkeeping.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn register(&self, id: &str, name: &str, user_type: UserType) -> Result<(), String>;
    async fn get(&self, id: &str) -> Result<Option<User>, String>;
    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<(), String>;
}

pub use token_layer::GuestTokenRepo;

/// `SETNX`-guarded OAuth `state` store, used once to prevent CSRF/replay on the callback.
#[async_trait]
pub trait OauthStateRepo: Send + Sync {
    async fn set_nx(&self, state: &str) -> Result<bool, String>;
    async fn consume(&self, state: &str) -> Result<bool, String>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> chrono::DateTime<chrono::Utc>;
}
