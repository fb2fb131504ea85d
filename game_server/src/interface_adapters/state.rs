use std::sync::Arc;

use token_layer::{TokenGenerator, TokenValidator};

use crate::domain::ports::SystemClock;
use crate::frameworks::config::Settings;
use crate::interface_adapters::protocol::{GameFrame, LobbyFrame};
use crate::interface_adapters::repos::amqp::AmqpBroker;
use crate::interface_adapters::repos::guest_token::RedisGuestTokenRepo;
use crate::interface_adapters::repos::postgres::{PostgresGameRepo, PostgresGameResultRepo};
use crate::interface_adapters::repos::redis::{RedisGameCacheRepo, RedisLobbyCacheRepo};
use crate::interface_adapters::repos::word_generator::FileWordGenerator;
use crate::use_cases::session::SessionManager;

/// Everything a handler needs, wired once at startup. Repo adapters are
/// concrete types rather than `dyn Port` objects — the generic services in
/// `use_cases` are monomorphized per adapter anyway, so there's nothing to
/// gain from the extra indirection.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub game_repo: Arc<PostgresGameRepo>,
    pub game_result_repo: Arc<PostgresGameResultRepo>,
    pub lobby_cache_repo: Arc<RedisLobbyCacheRepo>,
    pub game_cache_repo: Arc<RedisGameCacheRepo>,
    pub guest_token_repo: Arc<RedisGuestTokenRepo>,
    pub broker: Arc<AmqpBroker>,
    pub word_generator: Arc<FileWordGenerator>,
    pub clock: Arc<SystemClock>,
    pub token_generator: Arc<TokenGenerator>,
    pub token_validator: Arc<TokenValidator>,
    pub lobby_sessions: Arc<SessionManager<LobbyFrame>>,
    pub game_sessions: Arc<SessionManager<GameFrame>>,
}
