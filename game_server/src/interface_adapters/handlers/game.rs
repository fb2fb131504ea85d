use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::ports::SystemClock;
use crate::interface_adapters::http::{authenticate, read_error, write_error};
use crate::interface_adapters::state::AppState;
use crate::use_cases::game::{GameService, GameStatisticsInput};

#[derive(Deserialize)]
pub struct GameIdQuery {
    pub game_id: i64,
}

#[derive(Serialize)]
struct CountdownResponse {
    seconds_left: f64,
}

pub async fn countdown(State(state): State<AppState>, Query(q): Query<GameIdQuery>) -> Response {
    let clock = SystemClock;
    let service = GameService {
        game_repo: state.game_repo.as_ref(),
        game_result_repo: state.game_result_repo.as_ref(),
        game_cache_repo: state.game_cache_repo.as_ref(),
        clock: &clock,
    };

    match service.get_countdown(q.game_id).await {
        Ok(seconds_left) => Json(CountdownResponse { seconds_left }).into_response(),
        Err(err) => read_error(err),
    }
}

#[derive(Serialize)]
struct WordsResponse {
    words: String,
}

pub async fn words(State(state): State<AppState>, Query(q): Query<GameIdQuery>) -> Response {
    let clock = SystemClock;
    let service = GameService {
        game_repo: state.game_repo.as_ref(),
        game_result_repo: state.game_result_repo.as_ref(),
        game_cache_repo: state.game_cache_repo.as_ref(),
        clock: &clock,
    };

    match service.get_words(q.game_id).await {
        Ok(words) => Json(WordsResponse { words }).into_response(),
        Err(err) => read_error(err),
    }
}

#[derive(Serialize)]
struct ResultResponse {
    ranking: Vec<crate::domain::entities::GameUserInfo>,
}

pub async fn result(State(state): State<AppState>, Query(q): Query<GameIdQuery>) -> Response {
    let clock = SystemClock;
    let service = GameService {
        game_repo: state.game_repo.as_ref(),
        game_result_repo: state.game_result_repo.as_ref(),
        game_cache_repo: state.game_cache_repo.as_ref(),
        clock: &clock,
    };

    match service.get_result(q.game_id).await {
        Ok(result) => Json(ResultResponse { ranking: result.ranking }).into_response(),
        Err(err) => read_error(err),
    }
}

#[derive(Deserialize)]
pub struct StatisticsBody {
    pub game_id: i64,
    pub wpm: f64,
    pub wpm_raw: f64,
    pub acc: f64,
}

pub async fn submit_statistics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<StatisticsBody>,
) -> Response {
    let claims = match authenticate(&headers, &state.token_validator) {
        Ok(claims) => claims,
        Err(err) => return write_error(err),
    };

    let clock = SystemClock;
    let service = GameService {
        game_repo: state.game_repo.as_ref(),
        game_result_repo: state.game_result_repo.as_ref(),
        game_cache_repo: state.game_cache_repo.as_ref(),
        clock: &clock,
    };

    let input = GameStatisticsInput {
        game_id: body.game_id,
        wpm: body.wpm,
        wpm_raw: body.wpm_raw,
        acc: body.acc,
    };

    match service
        .write_statistics(input, &claims.sub, &claims.name, claims.user_type)
        .await
    {
        Ok(()) => axum::http::StatusCode::NO_CONTENT.into_response(),
        Err(err) => write_error(err),
    }
}
