//! Session credential persistence.
//!
//! One credential at a time (access token plus optional refresh token),
//! shared by the gated API client and, through the `token` cookie, by the
//! request guard. Store calls never fail: unavailable storage reads as
//! "no session" and writes become no-ops.

mod cookie;
mod store;

pub use cookie::{TOKEN_COOKIE_NAME, clear_session_cookie, get_cookie, session_cookie};
pub use store::{
    FileTokenStore, MemoryTokenStore, SESSION_MAX_AGE_SECS, SessionCredential, TokenStore,
};
