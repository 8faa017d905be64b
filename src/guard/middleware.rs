//! Axum middleware applying the guard to every incoming request.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, info};

use super::{GuardDecision, GuardPolicy, evaluate};
use crate::jwt::JwtConfig;
use crate::session::{TOKEN_COOKIE_NAME, get_cookie};

/// State shared by the guard middleware.
#[derive(Clone)]
pub struct GuardState {
    pub jwt: Arc<JwtConfig>,
    pub policy: Arc<GuardPolicy>,
}

/// Redirect unauthenticated or unauthorized dashboard requests to login.
/// On success the verified `SessionClaims` are placed in request extensions.
pub async fn require_session(
    State(state): State<GuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    let decision = evaluate(
        request.uri().path(),
        get_cookie(request.headers(), TOKEN_COOKIE_NAME),
        &state.jwt,
        &state.policy,
    );

    match decision {
        GuardDecision::PassThrough => next.run(request).await,
        GuardDecision::Allow(claims) => {
            debug!(path = %request.uri().path(), role = %claims.role, "Dashboard access granted");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        GuardDecision::Redirect { location, reason } => {
            info!(path = %request.uri().path(), %reason, "Redirecting to login");
            Redirect::temporary(&location).into_response()
        }
    }
}
