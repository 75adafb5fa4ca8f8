//! Session identity transport.
//!
//! The session token travels in the `livepad_session` cookie. It is set
//! `HttpOnly; SameSite=Strict` whenever a new session is minted.

use axum::http::{header::COOKIE, HeaderMap};

pub const SESSION_COOKIE: &str = "livepad_session";

/// Read the session token from the request's `Cookie` headers.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value for a freshly minted session.
pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict")
}
