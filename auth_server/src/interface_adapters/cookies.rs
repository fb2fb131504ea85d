//! `Set-Cookie` construction and request-cookie scanning. No `axum-extra`
//! dependency in this crate — same call as `game_server`'s cookie reader,
//! extended here to also build outgoing cookies since this is the one
//! service that mints them.

use axum::http::HeaderMap;

pub const ACCESS_TOKEN_COOKIE: &str = "TP_AT";
pub const REFRESH_TOKEN_COOKIE: &str = "TP_RT";
pub const USERNAME_COOKIE: &str = "USERNAME";

pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

pub fn set_cookie(name: &str, value: &str, path: &str, max_age: i64) -> String {
    format!("{name}={value}; Path={path}; Max-Age={max_age}; HttpOnly; Secure")
}

pub fn delete_cookie(name: &str, path: &str) -> String {
    format!("{name}=; Path={path}; Max-Age=0; HttpOnly; Secure")
}
