use axum::routing::{get, post};
use axum::Router;

use crate::interface_adapters::handlers::{game, healthcheck, lobby, profile};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::ws;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/game/countdown", get(game::countdown))
        .route("/game/words", get(game::words))
        .route("/game/statistics", post(game::submit_statistics).get(game::result))
        .route("/lobby/players", get(lobby::players))
        .route("/lobby/countdown", get(lobby::countdown))
        .route("/lobby/leave", post(lobby::leave))
        .route("/profile/statistics", get(profile::statistics))
        .route("/profile/graph", get(profile::graph))
        .route("/profile/history", get(profile::history))
        .route("/healthcheck/ready", get(healthcheck::ready))
        .route("/healthcheck/alive", get(healthcheck::alive))
        .route("/lobby/queue-in/ws", get(ws::lobby::handler))
        .route("/game/ws", get(ws::game::handler))
        .with_state(state)
}

// Every field on `AppState` but `settings` fronts a real Postgres/Redis/AMQP
// connection, so route-contract tests like `auth_server`'s (built on a lazy
// pg pool) aren't available here without a live stack. Handler logic is
// exercised instead through the `use_cases` service tests, which fake every
// port directly.
