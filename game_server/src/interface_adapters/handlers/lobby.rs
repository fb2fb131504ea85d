use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::entities::LobbyUserInfo;
use crate::domain::errors::AppError;
use crate::domain::ports::{BrokerPort, Clock, LobbyCacheRepo};
use crate::interface_adapters::handlers::game::GameIdQuery;
use crate::interface_adapters::http::{authenticate, read_error, write_error};
use crate::interface_adapters::state::AppState;
use crate::use_cases::lobby::LobbyService;

#[derive(Serialize)]
struct PlayersResponse {
    me: Option<LobbyUserInfo>,
    others: Vec<LobbyUserInfo>,
}

pub async fn players(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<GameIdQuery>,
) -> Response {
    let claims = match authenticate(&headers, &state.token_validator) {
        Ok(claims) => claims,
        Err(err) => return read_error(err),
    };

    let service = LobbyService {
        game_repo: state.game_repo.as_ref(),
        lobby_cache_repo: state.lobby_cache_repo.as_ref(),
    };

    match service.get_players(&claims.sub, q.game_id).await {
        Ok(result) => Json(PlayersResponse { me: result.me, others: result.others }).into_response(),
        Err(err) => read_error(err),
    }
}

#[derive(Serialize)]
struct CountdownResponse {
    seconds_left: f64,
}

pub async fn countdown(State(state): State<AppState>, Query(q): Query<GameIdQuery>) -> Response {
    match state.lobby_cache_repo.get_start_time(q.game_id).await {
        Ok(Some(start_time)) => {
            let seconds_left = (start_time - state.clock.now()).num_milliseconds() as f64 / 1000.0;
            Json(CountdownResponse { seconds_left: seconds_left.max(0.0) }).into_response()
        }
        Ok(None) => read_error(AppError::GameNotFound),
        Err(err) => read_error(err),
    }
}

#[derive(Deserialize)]
pub struct LeaveBody {
    pub game_id: i64,
}

pub async fn leave(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LeaveBody>,
) -> Response {
    let claims = match authenticate(&headers, &state.token_validator) {
        Ok(claims) => claims,
        Err(err) => return write_error(err),
    };

    let service = LobbyService {
        game_repo: state.game_repo.as_ref(),
        lobby_cache_repo: state.lobby_cache_repo.as_ref(),
    };

    match service.leave(&claims.sub, body.game_id).await {
        Ok(()) => {
            let _ = state.broker.notify_user_left(body.game_id).await;
            if let Some(group) = state.lobby_sessions.get(body.game_id) {
                group.remove(&claims.sub, None);
            }
            axum::http::StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => write_error(err),
    }
}
