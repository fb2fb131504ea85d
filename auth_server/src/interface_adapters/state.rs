use std::sync::Arc;

use token_layer::{TokenGenerator, TokenValidator};

use crate::domain::ports::Clock;
use crate::frameworks::config::Settings;
use crate::interface_adapters::repos::google_oauth::GoogleOauthClient;
use crate::interface_adapters::repos::guest_token::RedisGuestTokenRepo;
use crate::interface_adapters::repos::oauth_state::RedisOauthStateRepo;
use crate::interface_adapters::repos::postgres::PostgresUserRepo;
use crate::use_cases::oauth_login::GoogleOauthConfig;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub user_repo: Arc<PostgresUserRepo>,
    pub oauth_state_repo: Arc<RedisOauthStateRepo>,
    pub guest_token_repo: Arc<RedisGuestTokenRepo>,
    pub google_client: Arc<GoogleOauthClient>,
    pub google_config: Arc<GoogleOauthConfig>,
    pub token_generator: Arc<TokenGenerator>,
    pub token_validator: Arc<TokenValidator>,
    pub clock: Arc<SystemClock>,
}

// System clock adapter used by auth use cases.
#[derive(Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}
