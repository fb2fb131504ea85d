// Framework bootstrap for the auth server runtime.

use std::io::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;

use token_layer::{TokenDurations, TokenGenerator, TokenKeys, TokenValidator};

use crate::frameworks::config::Settings;
use crate::frameworks::db;
use crate::interface_adapters::repos::google_oauth::GoogleOauthClient;
use crate::interface_adapters::repos::guest_token::RedisGuestTokenRepo;
use crate::interface_adapters::repos::oauth_state::RedisOauthStateRepo;
use crate::interface_adapters::repos::postgres::PostgresUserRepo;
use crate::interface_adapters::routes;
use crate::interface_adapters::state::{AppState, SystemClock};
use crate::use_cases::oauth_login::GoogleOauthConfig;

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

    let app = routes::app(state);

    tracing::info!(%address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let port = Settings::load().map(|s| s.server.port).unwrap_or(8081);
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

    let keys = load_token_keys(&settings)?;
    let token_generator = TokenGenerator::new(
        keys.clone(),
        TokenDurations {
            access_seconds: settings.token.access_duration,
            refresh_seconds: settings.token.refresh_duration,
        },
    );
    let token_validator = TokenValidator::new(keys);

    let google_client = GoogleOauthClient::new(
        settings.google.client_id.clone(),
        settings.google.client_secret.clone(),
        settings.google.redirect_url.clone(),
    );
    let google_config =
        GoogleOauthConfig { client_id: settings.google.client_id.clone(), redirect_url: settings.google.redirect_url.clone() };

    Ok(AppState {
        user_repo: Arc::new(PostgresUserRepo { pool: pg_pool }),
        oauth_state_repo: Arc::new(RedisOauthStateRepo { conn: redis_conn.clone(), expire_secs: settings.redis.expire_time }),
        guest_token_repo: Arc::new(RedisGuestTokenRepo { conn: redis_conn, expire_secs: settings.redis.expire_time }),
        google_client,
        google_config: Arc::new(google_config),
        token_generator: Arc::new(token_generator),
        token_validator: Arc::new(token_validator),
        clock: Arc::new(SystemClock),
        settings: Arc::new(settings),
    })
}
