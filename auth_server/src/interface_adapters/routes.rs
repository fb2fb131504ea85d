use axum::routing::{get, post};
use axum::Router;

use crate::interface_adapters::handlers::{guest_token, login, login_redirect, logout, token_refresh};
use crate::interface_adapters::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/auth/{provider}/login", get(login))
        .route("/auth/{provider}/login-redirect", get(login_redirect))
        .route("/auth/logout", post(logout))
        .route("/auth/token-refresh", post(token_refresh))
        .route("/auth/guest-token", get(guest_token))
        .with_state(state)
}

// Every field on `AppState` now fronts a real Postgres/Redis connection —
// Redis's `ConnectionManager` can't be built lazily the way `sqlx`'s pool
// can, so route-contract tests built on a lazy pool (as this module used
// to have) aren't available without a live stack. Handler logic is
// exercised instead through the `use_cases` tests, which fake every port.
