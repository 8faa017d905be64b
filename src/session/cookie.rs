//! Cookie helpers for the session token.

use axum::http::{HeaderMap, header};

use super::store::SESSION_MAX_AGE_SECS;

/// Cookie holding the access token, readable by the request guard.
pub const TOKEN_COOKIE_NAME: &str = "token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// `Set-Cookie` value persisting the access token for the whole site.
pub fn session_cookie(token: &str, secure: bool) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Lax{}",
        TOKEN_COOKIE_NAME,
        token,
        SESSION_MAX_AGE_SECS,
        secure_suffix(secure)
    )
}

/// `Set-Cookie` value expiring the access token immediately.
pub fn clear_session_cookie(secure: bool) -> String {
    format!(
        "{}=; Path=/; Max-Age=0; SameSite=Lax{}",
        TOKEN_COOKIE_NAME,
        secure_suffix(secure)
    )
}

fn secure_suffix(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}
