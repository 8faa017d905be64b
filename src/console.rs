//! Server-rendered login, logout and dashboard shell pages.
//!
//! Dashboard pages only render once the guard middleware has admitted the
//! request; they read the verified claims from request extensions. Login
//! submissions are forwarded to the backend and turned into the `token` cookie.

use axum::{
    Extension, Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

use crate::client::{ApiClient, ClientError, is_rejected_login};
use crate::guard::{DashboardScope, GuardDecision, GuardPolicy, evaluate};
use crate::jwt::{JwtConfig, SessionClaims};
use crate::session::{
    MemoryTokenStore, SessionCredential, TOKEN_COOKIE_NAME, TokenStore, clear_session_cookie,
    get_cookie, session_cookie,
};

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// Shown when the backend could not be reached or answered nonsense.
const LOGIN_UNAVAILABLE: &str = "Login is unavailable right now";

#[derive(Clone)]
pub struct ConsoleState {
    pub jwt: Arc<JwtConfig>,
    /// Same policy the guard enforces on dashboards
    pub policy: Arc<GuardPolicy>,
    pub api_base: Url,
    pub http: reqwest::Client,
    pub secure_cookies: bool,
}

impl ConsoleState {
    fn client(&self, store: Arc<dyn TokenStore>) -> Result<ApiClient, ClientError> {
        ApiClient::builder(self.api_base.clone(), store)
            .http_client(self.http.clone())
            .build()
    }
}

#[derive(Deserialize)]
pub struct LoginQuery {
    from: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    from: Option<String>,
}

/// Scope a login page belongs to: `/r/<slug>/[<role>/]login` or `/login`.
fn login_scope(path: &str) -> DashboardScope {
    path.strip_suffix("/login")
        .and_then(|prefix| DashboardScope::from_path(&format!("{}/dashboard", prefix)))
        .unwrap_or(DashboardScope::Platform)
}

/// Accept `from` only as a same-site path; anything else lands on the scope's dashboard.
fn post_login_target(from: Option<&str>, scope: &DashboardScope) -> String {
    match from {
        Some(from) if from.starts_with('/') && !from.starts_with("//") && !from.contains('\\') => {
            from.to_string()
        }
        _ => scope.default_landing(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_page(status: StatusCode, title: &str, body: String) -> Response {
    let page = format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>",
        escape_html(title),
        body
    );
    (status, [(header::CACHE_CONTROL, NO_CACHE)], Html(page)).into_response()
}

fn login_page(status: StatusCode, action: &str, from: Option<&str>, message: Option<&str>) -> Response {
    let error = message
        .map(|m| format!("<p role=\"alert\">{}</p>", escape_html(m)))
        .unwrap_or_default();
    let from = from
        .map(|f| format!("<input type=\"hidden\" name=\"from\" value=\"{}\">", escape_html(f)))
        .unwrap_or_default();

    html_page(
        status,
        "Sign in",
        format!(
            "<h1>Sign in</h1>{error}<form method=\"post\" action=\"{action}\">\
             <label>Email <input type=\"email\" name=\"email\" required></label>\
             <label>Password <input type=\"password\" name=\"password\" required></label>\
             {from}<button type=\"submit\">Sign in</button></form>",
            action = escape_html(action),
        ),
    )
}

/// Serve a login page, sending visitors who already hold a valid session onward.
pub async fn login_form(
    State(state): State<ConsoleState>,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Response {
    let scope = login_scope(uri.path());

    // Skip the form only when the guard would admit the session both on this
    // scope's dashboard and on the requested target, otherwise the two bounce
    // the visitor between each other.
    if let Some(token) = get_cookie(&headers, TOKEN_COOKIE_NAME) {
        let target = post_login_target(query.from.as_deref(), &scope);
        let decide = |path: &str| evaluate(path, Some(token), &state.jwt, &state.policy);

        let landing = scope.default_landing();
        let on_scope = matches!(decide(landing.as_str()), GuardDecision::Allow(_));
        let on_target = !matches!(decide(target.as_str()), GuardDecision::Redirect { .. });
        if on_scope && on_target {
            return Redirect::temporary(&target).into_response();
        }
    }

    login_page(StatusCode::OK, uri.path(), query.from.as_deref(), None)
}

/// Forward credentials to the backend and turn the issued token into the session cookie.
pub async fn login_submit(
    State(state): State<ConsoleState>,
    uri: Uri,
    Form(form): Form<LoginForm>,
) -> Response {
    let scope = login_scope(uri.path());
    let store = Arc::new(MemoryTokenStore::new());

    let client = match state.client(store.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to build backend client");
            return login_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                uri.path(),
                form.from.as_deref(),
                Some(LOGIN_UNAVAILABLE),
            );
        }
    };

    let outcome = client.login(form.email.trim(), &form.password).await;
    let token = match outcome {
        Ok(_) => store.get_token(),
        Err(e) => {
            // Only backend-authored messages reach the page
            let (status, message) = if e.is_subscription_inactive() {
                (StatusCode::FORBIDDEN, e.to_string())
            } else if is_rejected_login(&e) {
                (StatusCode::UNAUTHORIZED, e.to_string())
            } else {
                warn!(error = %e, "Backend login call failed");
                (StatusCode::BAD_GATEWAY, LOGIN_UNAVAILABLE.to_string())
            };
            return login_page(status, uri.path(), form.from.as_deref(), Some(&message));
        }
    };

    let Some(token) = token else {
        warn!("Backend accepted login but issued no token");
        return login_page(
            StatusCode::BAD_GATEWAY,
            uri.path(),
            form.from.as_deref(),
            Some("Login failed"),
        );
    };

    let target = post_login_target(form.from.as_deref(), &scope);
    info!(redirect_to = %target, "Login succeeded");
    (
        [(header::SET_COOKIE, session_cookie(&token, state.secure_cookies))],
        Redirect::to(&target),
    )
        .into_response()
}

/// End the session: best-effort backend logout, then drop the cookie.
pub async fn logout(State(state): State<ConsoleState>, headers: HeaderMap) -> Response {
    if let Some(token) = get_cookie(&headers, TOKEN_COOKIE_NAME) {
        let store = Arc::new(MemoryTokenStore::with_credential(
            SessionCredential::access_only(token),
        ));
        match state.client(store) {
            // Failures are logged by the client; the cookie is cleared regardless
            Ok(client) => {
                let _ = client.logout().await;
            }
            Err(e) => error!(error = %e, "Failed to build backend client"),
        }
    }

    (
        [(header::SET_COOKIE, clear_session_cookie(state.secure_cookies))],
        Redirect::to(DashboardScope::Platform.login_path().as_str()),
    )
        .into_response()
}

/// Dashboard shell. Page content is rendered client-side from the backend API.
pub async fn dashboard(Extension(claims): Extension<SessionClaims>, uri: Uri) -> Response {
    let scope = DashboardScope::from_path(uri.path());
    let tenant = claims
        .tenant_slug
        .as_deref()
        .or_else(|| scope.as_ref().and_then(DashboardScope::tenant_slug))
        .map(|t| format!(" for <strong>{}</strong>", escape_html(t)))
        .unwrap_or_default();

    html_page(
        StatusCode::OK,
        "Dashboard",
        format!(
            "<h1>Dashboard</h1><p>Signed in as <strong>{}</strong>{}</p>\
             <p data-path=\"{}\"></p>\
             <form method=\"post\" action=\"/logout\"><button type=\"submit\">Sign out</button></form>",
            claims.role,
            tenant,
            escape_html(uri.path()),
        ),
    )
}
