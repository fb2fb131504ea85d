//! Shared `AppError -> HTTP response` mapping. `GAME_NOT_FOUND` carries two
//! different statuses depending on whether the caller was reading or
//! writing — everything else maps one-to-one.

use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::errors::AppError;
use token_layer::{JwtPayload, TokenValidator};

pub const ACCESS_TOKEN_COOKIE: &str = "TP_AT";

/// Pulls a single cookie value out of the raw `Cookie` header. No
/// `axum-extra` dependency in this crate, so this is a plain scan rather
/// than a `CookieJar` extractor.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Validates the `TP_AT` cookie against `validator`. Every authenticated
/// HTTP handler in this crate goes through this — there's no session
/// store here, the token itself is the credential.
pub fn authenticate(headers: &HeaderMap, validator: &TokenValidator) -> Result<JwtPayload, AppError> {
    let token = cookie(headers, ACCESS_TOKEN_COOKIE).ok_or(AppError::InvalidToken)?;
    validator.validate(&token).map_err(|_| AppError::InvalidToken)
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

fn error_response(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}

/// Maps an error arising from a read (GET) handler.
pub fn read_error(err: AppError) -> Response {
    let status = match err {
        AppError::GameNotFound | AppError::WordsNotFound => StatusCode::NOT_FOUND,
        _ => status_for(err),
    };
    error_response(status, err.code())
}

/// Maps an error arising from a write (POST) handler.
pub fn write_error(err: AppError) -> Response {
    error_response(status_for(err), err.code())
}

fn status_for(err: AppError) -> StatusCode {
    match err {
        AppError::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::InvalidToken => StatusCode::BAD_REQUEST,
        AppError::KeyNotFound => StatusCode::BAD_REQUEST,
        AppError::GameNotFound => StatusCode::BAD_REQUEST,
        AppError::NotAParticipant => StatusCode::BAD_REQUEST,
        AppError::WordsNotFound => StatusCode::NOT_FOUND,
        AppError::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::PublishNotAcknowledged => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::AmqpNotReady => StatusCode::SERVICE_UNAVAILABLE,
    }
}
