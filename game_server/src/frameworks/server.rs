// Framework bootstrap for the game server runtime.

use std::io::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lapin::options::BasicQosOptions;
use token_layer::{TokenDurations, TokenGenerator, TokenKeys, TokenValidator};

use crate::domain::ports::SystemClock;
use crate::frameworks::config::Settings;
use crate::frameworks::db;
use crate::interface_adapters::protocol::{GameEvent, GameFrame, LobbyEvent, LobbyFrame};
use crate::interface_adapters::repos::amqp::{self, AmqpBroker};
use crate::interface_adapters::repos::guest_token::RedisGuestTokenRepo;
use crate::interface_adapters::repos::postgres::{PostgresGameRepo, PostgresGameResultRepo};
use crate::interface_adapters::repos::redis::{RedisGameCacheRepo, RedisLobbyCacheRepo};
use crate::interface_adapters::repos::word_generator::FileWordGenerator;
use crate::interface_adapters::routes;
use crate::interface_adapters::state::AppState;
use crate::use_cases::consumers::game_cleanup::GameCleanupConsumer;
use crate::use_cases::consumers::game_start::GameStartConsumer;
use crate::use_cases::consumers::keystroke::KeystrokeConsumer;
use crate::use_cases::consumers::lobby_countdown::LobbyCountdownConsumer;
use crate::use_cases::consumers::lobby_notify::LobbyNotifyConsumer;
use crate::use_cases::session::SessionManager;

fn other<E: std::fmt::Display>(context: &str, err: E) -> Error {
    Error::other(format!("{context}: {err}"))
}

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let settings = Settings::load().map_err(|e| other("failed to load config", e))?;
    let state = build_state(settings).await?;

    spawn_consumers(&state);

    let shutdown_state = state.clone();
    let app = routes::app(state);

    tracing::info!(%address, "listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        });

    shutdown_state.lobby_sessions.cleanup(None);
    shutdown_state.game_sessions.cleanup(None);
    tracing::info!("session groups stopped");

    result
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let port = Settings::load().map(|s| s.server.port).unwrap_or(8080);
    let address = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(address).await.inspect_err(|e| {
        tracing::error!(%address, error = %e, "failed to bind");
    })?;

    run(listener).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

fn load_token_keys(settings: &Settings) -> Result<TokenKeys> {
    let private_key_pem = std::fs::read(&settings.token.private_key_path)
        .map_err(|e| other("failed to read token private key", e))?;
    let public_key_pem = std::fs::read(&settings.token.public_key_path)
        .map_err(|e| other("failed to read token public key", e))?;
    Ok(TokenKeys { private_key_pem, public_key_pem })
}

async fn build_state(settings: Settings) -> Result<AppState> {
    let pg_pool = db::connect_postgres(&settings).await.map_err(|e| other("failed to connect postgres", e))?;
    db::run_migrations(&pg_pool).await.map_err(|e| other("failed to run migrations", e))?;

    let redis_conn = db::connect_redis(&settings).await.map_err(|e| other("failed to connect redis", e))?;

    let amqp_connection = db::connect_amqp(&settings).await.map_err(|e| other("failed to connect amqp", e))?;
    let amqp_channel = amqp_connection
        .create_channel()
        .await
        .map_err(|e| other("failed to open amqp channel", e))?;
    amqp::declare_topology(&amqp_channel, &settings.server_name, &settings.game)
        .await
        .map_err(|e| other("failed to declare amqp topology", e))?;
    let broker = AmqpBroker::new(amqp_channel, settings.server_name.clone(), &settings.game);

    let keys = load_token_keys(&settings)?;
    let token_generator = TokenGenerator::new(
        keys.clone(),
        TokenDurations {
            access_seconds: settings.token.access_duration,
            refresh_seconds: settings.token.refresh_duration,
        },
    );
    let token_validator = TokenValidator::new(keys);

    let word_generator =
        FileWordGenerator::load(&settings.game.word_file).map_err(|e| other("failed to load word file", e))?;

    let ping_interval = Duration::from_secs(settings.bg.ping_interval);
    let (lobby_sessions, _lobby_supervisor) =
        SessionManager::<LobbyFrame>::new(ping_interval, Arc::new(make_lobby_ping));
    let (game_sessions, _game_supervisor) = SessionManager::<GameFrame>::new(ping_interval, Arc::new(make_game_ping));

    Ok(AppState {
        game_repo: Arc::new(PostgresGameRepo { pool: pg_pool.clone() }),
        game_result_repo: Arc::new(PostgresGameResultRepo { pool: pg_pool }),
        lobby_cache_repo: Arc::new(RedisLobbyCacheRepo { conn: redis_conn.clone(), expire_secs: settings.redis.expire_time }),
        game_cache_repo: Arc::new(RedisGameCacheRepo {
            conn: redis_conn.clone(),
            expire_secs: settings.redis.result_cache_expire_time,
        }),
        guest_token_repo: Arc::new(RedisGuestTokenRepo { conn: redis_conn, expire_secs: settings.redis.expire_time }),
        broker: Arc::new(broker),
        word_generator: Arc::new(word_generator),
        clock: Arc::new(SystemClock),
        token_generator: Arc::new(token_generator),
        token_validator: Arc::new(token_validator),
        lobby_sessions,
        game_sessions,
        settings: Arc::new(settings),
    })
}

fn make_lobby_ping() -> LobbyFrame {
    LobbyFrame { event: LobbyEvent::Ping, game_id: None, user_id: None, guest_token_key: None }
}

fn make_game_ping() -> GameFrame {
    GameFrame { event: GameEvent::Ping, game_id: 0, user_id: None, word_index: None, char_index: None }
}

/// Kicks off one long-running task per queue this instance consumes from.
/// Each builds its own `*Consumer` inside the delivery closure, borrowing
/// straight off `AppState`'s `Arc` fields, rather than trying to hold a
/// borrow across the `'static` task boundary.
fn spawn_consumers(state: &AppState) {
    spawn_lobby_notify(state);
    spawn_lobby_countdown(state);
    spawn_game_start(state);
    spawn_game_cleanup(state);
    spawn_keystroke(state);
}

async fn apply_qos(channel: &lapin::Channel, prefetch_count: u16, queue: &str) {
    if let Err(err) = channel.basic_qos(prefetch_count, BasicQosOptions::default()).await {
        tracing::error!(error = %err, queue, "failed to set consumer qos");
    }
}

fn spawn_lobby_notify(state: &AppState) {
    let queue = crate::use_cases::broker::lobby_notify_queue(&state.settings.server_name);
    let tag = format!("{}-lobby-notify", state.settings.server_name);
    let consumer = LobbyNotifyConsumer { session_manager: state.lobby_sessions.clone() };
    let channel = state.broker.channel.clone();
    let prefetch = state.settings.amqp.prefetch_count;
    tokio::spawn(async move {
        apply_qos(&channel, prefetch, &queue).await;
        amqp::run_consumer(channel, queue, tag, move |body, _source| {
            let consumer = &consumer;
            async move { consumer.handle(&body).await }
        })
        .await;
    });
}

fn spawn_game_start(state: &AppState) {
    let queue = crate::use_cases::broker::game_start_queue(&state.settings.server_name);
    let tag = format!("{}-game-start", state.settings.server_name);
    let consumer = GameStartConsumer { session_manager: state.game_sessions.clone() };
    let channel = state.broker.channel.clone();
    let prefetch = state.settings.amqp.prefetch_count;
    tokio::spawn(async move {
        apply_qos(&channel, prefetch, &queue).await;
        amqp::run_consumer(channel, queue, tag, move |body, _source| {
            let consumer = &consumer;
            async move { consumer.handle(&body).await }
        })
        .await;
    });
}

fn spawn_keystroke(state: &AppState) {
    let queue = crate::use_cases::broker::game_keystroke_queue(&state.settings.server_name);
    let tag = format!("{}-keystroke", state.settings.server_name);
    let consumer = KeystrokeConsumer {
        session_manager: state.game_sessions.clone(),
        server_name: state.settings.server_name.clone(),
        suppress_echo: state.settings.game.suppress_keystroke_echo,
    };
    let channel = state.broker.channel.clone();
    let prefetch = state.settings.amqp.prefetch_count;
    tokio::spawn(async move {
        apply_qos(&channel, prefetch, &queue).await;
        amqp::run_consumer(channel, queue, tag, move |body, source| {
            let consumer = &consumer;
            async move { consumer.handle(&body, source.as_deref()).await }
        })
        .await;
    });
}

fn spawn_lobby_countdown(state: &AppState) {
    let queue = crate::use_cases::broker::LOBBY_COUNTDOWN_QUEUE.to_string();
    let tag = format!("{}-lobby-countdown", state.settings.server_name);
    let channel = state.broker.channel.clone();
    let prefetch = state.settings.amqp.prefetch_count;
    let state = state.clone();
    tokio::spawn(async move {
        apply_qos(&channel, prefetch, &queue).await;
        amqp::run_consumer(channel, queue, tag, move |body, _source| {
            let state = state.clone();
            async move {
                let consumer = LobbyCountdownConsumer {
                    game_repo: state.game_repo.as_ref(),
                    lobby_cache_repo: state.lobby_cache_repo.as_ref(),
                    game_cache_repo: state.game_cache_repo.as_ref(),
                    broker: state.broker.as_ref(),
                    word_generator: state.word_generator.as_ref(),
                    clock: state.clock.as_ref(),
                    start_countdown_secs: state.settings.game.start_countdown,
                };
                consumer.handle(&body).await
            }
        })
        .await;
    });
}

fn spawn_game_cleanup(state: &AppState) {
    let queue = crate::use_cases::broker::GAME_CLEANUP_QUEUE.to_string();
    let tag = format!("{}-game-cleanup", state.settings.server_name);
    let channel = state.broker.channel.clone();
    let prefetch = state.settings.amqp.prefetch_count;
    let state = state.clone();
    tokio::spawn(async move {
        apply_qos(&channel, prefetch, &queue).await;
        amqp::run_consumer(channel, queue, tag, move |body, _source| {
            let state = state.clone();
            async move {
                let consumer = GameCleanupConsumer {
                    game_repo: state.game_repo.as_ref(),
                    lobby_cache_repo: state.lobby_cache_repo.as_ref(),
                    game_cache_repo: state.game_cache_repo.as_ref(),
                    clock: state.clock.as_ref(),
                };
                consumer.handle(&body).await
            }
        })
        .await;
    });
}
