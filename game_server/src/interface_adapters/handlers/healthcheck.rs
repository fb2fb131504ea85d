use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::frameworks::config::readiness_probe_timeout;
use crate::interface_adapters::state::AppState;

/// Liveness: the process is scheduling tasks at all. Never depends on
/// downstream services — that's what `/ready` is for.
pub async fn alive() -> StatusCode {
    StatusCode::OK
}

/// Readiness: can this instance actually publish right now. Bounded by
/// `readiness_probe_timeout` so a wedged broker fails fast instead of
/// piling up concurrent health checks.
pub async fn ready(State(state): State<AppState>) -> Response {
    let check = async { state.broker.is_ready() };
    match tokio::time::timeout(readiness_probe_timeout(), check).await {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) | Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
