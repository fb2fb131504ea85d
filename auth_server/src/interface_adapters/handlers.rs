use axum::extract::{Path, Query, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Response, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::domain::errors::AuthError;
use crate::interface_adapters::cookies::{self, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, USERNAME_COOKIE};
use crate::interface_adapters::protocol::{ErrorResponse, GuestTokenQuery, OauthCallbackQuery, SuccessResponse};
use crate::interface_adapters::state::AppState;
use crate::use_cases::guest_login::RedeemGuestTokenUseCase;
use crate::use_cases::logout::LogoutUseCase;
use crate::use_cases::oauth_login::{OauthCallbackUseCase, OauthLoginUseCase};
use crate::use_cases::token_refresh::TokenRefreshUseCase;

const GOOGLE: &str = "google";

fn status_for(err: AuthError) -> StatusCode {
    match err {
        AuthError::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::InvalidToken => StatusCode::BAD_REQUEST,
        AuthError::RefreshTokenMismatch => StatusCode::BAD_REQUEST,
        AuthError::KeyNotFound => StatusCode::BAD_REQUEST,
        AuthError::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn error_response(err: AuthError) -> Response<axum::body::Body> {
    (status_for(err), Json(ErrorResponse { code: err.code(), message: err.code().to_string() })).into_response()
}

fn redirect_to(location: &str) -> Response<axum::body::Body> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, location)
        .body(axum::body::Body::empty())
        .expect("valid redirect response")
}

/// `GET /auth/{provider}/login` — redirects to the provider's consent
/// screen, or to `error_redirect` if the state couldn't be stashed.
pub async fn login(Path(provider): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    if provider != GOOGLE {
        return redirect_to(&state.settings.error_redirect);
    }

    let use_case = OauthLoginUseCase { state_repo: state.oauth_state_repo.as_ref(), google: state.google_config.as_ref() };

    match use_case.execute().await {
        Ok(url) => redirect_to(url.as_str()),
        Err(err) => {
            tracing::warn!(error = ?err, "oauth login failed");
            redirect_to(&state.settings.error_redirect)
        }
    }
}

/// `GET /auth/{provider}/login-redirect` — the OAuth callback. Exchanges
/// the code, upserts the user, and redirects to the front end with the
/// access/refresh/username cookies set.
pub async fn login_redirect(
    Path(provider): Path<String>,
    Query(query): Query<OauthCallbackQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    if provider != GOOGLE {
        return redirect_to(&state.settings.error_redirect);
    }

    let profile = match state.google_client.exchange_code(&query.code).await {
        Ok(profile) => profile,
        Err(err) => {
            tracing::warn!(error = ?err, "google code exchange failed");
            return redirect_to(&state.settings.error_redirect);
        }
    };
    let username = profile.name.clone();

    let use_case = OauthCallbackUseCase {
        state_repo: state.oauth_state_repo.as_ref(),
        user_repo: state.user_repo.as_ref(),
        token_generator: state.token_generator.as_ref(),
    };

    let pair = match use_case.execute(&query.state, profile).await {
        Ok(pair) => pair,
        Err(err) => {
            tracing::warn!(error = ?err, "oauth callback failed");
            return redirect_to(&state.settings.error_redirect);
        }
    };

    let max_age = state.settings.token.refresh_duration;
    let encoded_username = url::form_urlencoded::byte_serialize(username.as_bytes()).collect::<String>();

    Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, state.settings.front_end_endpoint.as_str())
        .header(SET_COOKIE, cookies::set_cookie(ACCESS_TOKEN_COOKIE, &pair.access_token, "/", max_age))
        .header(
            SET_COOKIE,
            cookies::set_cookie(REFRESH_TOKEN_COOKIE, &pair.refresh_token, &state.settings.token.refresh_endpoint, max_age),
        )
        .header(SET_COOKIE, cookies::set_cookie(USERNAME_COOKIE, &encoded_username, "/", max_age))
        .body(axum::body::Body::empty())
        .expect("valid redirect response")
}

/// `POST /auth/logout` — clears the stored refresh token (if the access
/// cookie still names a known user) and expires all three cookies.
/// Always succeeds, even for an already-logged-out caller.
pub async fn logout(headers: HeaderMap, State(state): State<AppState>) -> impl IntoResponse {
    if let Some(access_token) = cookies::cookie(&headers, ACCESS_TOKEN_COOKIE) {
        if let Ok(claims) = state.token_validator.validate(&access_token) {
            let use_case = LogoutUseCase { user_repo: state.user_repo.as_ref() };
            if let Err(err) = use_case.execute(&claims.sub).await {
                tracing::warn!(error = ?err, "logout failed to clear refresh token");
            }
        }
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(SET_COOKIE, cookies::delete_cookie(ACCESS_TOKEN_COOKIE, "/"))
        .header(SET_COOKIE, cookies::delete_cookie(REFRESH_TOKEN_COOKIE, &state.settings.token.refresh_endpoint))
        .header(SET_COOKIE, cookies::delete_cookie(USERNAME_COOKIE, "/"))
        .body(axum::body::Body::from(serde_json::to_vec(&SuccessResponse::default()).unwrap()))
        .expect("valid logout response")
}

/// `POST /auth/token-refresh` — validates the `TP_RT` cookie and mints a
/// fresh access token.
pub async fn token_refresh(headers: HeaderMap, State(state): State<AppState>) -> impl IntoResponse {
    let Some(refresh_token) = cookies::cookie(&headers, REFRESH_TOKEN_COOKIE) else {
        return error_response(AuthError::InvalidToken);
    };

    let use_case = TokenRefreshUseCase {
        token_validator: state.token_validator.as_ref(),
        token_generator: state.token_generator.as_ref(),
        user_repo: state.user_repo.as_ref(),
    };

    match use_case.execute(&refresh_token).await {
        Ok(pair) => {
            let max_age = state.settings.token.refresh_duration;
            Response::builder()
                .status(StatusCode::OK)
                .header(SET_COOKIE, cookies::set_cookie(ACCESS_TOKEN_COOKIE, &pair.access_token, "/", max_age))
                .body(axum::body::Body::from(serde_json::to_vec(&SuccessResponse::default()).unwrap()))
                .expect("valid token-refresh response")
        }
        Err(err) => error_response(err),
    }
}

/// `GET /auth/guest-token?key=` — redeems a one-shot guest-token key
/// minted by `game_server`'s QueueIn join path.
pub async fn guest_token(Query(query): Query<GuestTokenQuery>, State(state): State<AppState>) -> impl IntoResponse {
    let use_case = RedeemGuestTokenUseCase { guest_token_repo: state.guest_token_repo.as_ref() };

    match use_case.execute(&query.key).await {
        Ok(token) => {
            let max_age = state.settings.token.refresh_duration;
            Response::builder()
                .status(StatusCode::OK)
                .header(SET_COOKIE, cookies::set_cookie(ACCESS_TOKEN_COOKIE, &token, "/", max_age))
                .body(axum::body::Body::from(serde_json::to_vec(&SuccessResponse::default()).unwrap()))
                .expect("valid guest-token response")
        }
        Err(err) => error_response(err),
    }
}
