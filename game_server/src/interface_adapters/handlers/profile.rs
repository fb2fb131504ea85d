use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::interface_adapters::http::{authenticate, read_error};
use crate::interface_adapters::state::AppState;
use crate::use_cases::profile::ProfileService;

pub async fn statistics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let claims = match authenticate(&headers, &state.token_validator) {
        Ok(claims) => claims,
        Err(err) => return read_error(err),
    };

    let service = ProfileService { game_result_repo: state.game_result_repo.as_ref() };
    match service.statistics(&claims.sub, claims.user_type).await {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => read_error(err),
    }
}

#[derive(Deserialize)]
pub struct GraphQuery {
    #[serde(default = "default_graph_size")]
    pub size: i64,
}

fn default_graph_size() -> i64 {
    10
}

pub async fn graph(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<GraphQuery>,
) -> Response {
    let claims = match authenticate(&headers, &state.token_validator) {
        Ok(claims) => claims,
        Err(err) => return read_error(err),
    };

    let service = ProfileService { game_result_repo: state.game_result_repo.as_ref() };
    match service.graph(&claims.sub, claims.user_type, q.size).await {
        Ok(points) => Json(points).into_response(),
        Err(err) => read_error(err),
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_size")]
    pub size: i64,
    #[serde(default = "default_history_page")]
    pub page: i64,
}

fn default_history_size() -> i64 {
    10
}

fn default_history_page() -> i64 {
    1
}

pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<HistoryQuery>,
) -> Response {
    let claims = match authenticate(&headers, &state.token_validator) {
        Ok(claims) => claims,
        Err(err) => return read_error(err),
    };

    let service = ProfileService { game_result_repo: state.game_result_repo.as_ref() };
    match service.history(&claims.sub, claims.user_type, q.size, q.page).await {
        Ok(result) => Json(HistoryResponse {
            total: result.total,
            has_prev_page: result.has_prev_page,
            has_next_page: result.has_next_page,
            data: result.data,
        })
        .into_response(),
        Err(err) => read_error(err),
    }
}

#[derive(serde::Serialize)]
struct HistoryResponse {
    total: i64,
    has_prev_page: bool,
    has_next_page: bool,
    data: Vec<crate::domain::ports::GameResultWithType>,
}
