pub mod cli;
pub mod client;
pub mod console;
pub mod guard;
pub mod jwt;
pub mod rate_limit;
pub mod session;

use axum::{
    Router, middleware,
    response::Redirect,
    routing::{MethodRouter, get, post},
};
use console::{ConsoleState, dashboard, login_form, login_submit, logout};
use guard::{GuardPolicy, GuardState, require_session};
use jwt::{JwtConfig, Role};
use rate_limit::{RateLimitConfig, rate_limit_login_submit};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Base URL of the restaurant backend REST API
    pub api_base: Url,
    /// Secret the backend signs session tokens with
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Roles admitted to dashboards
    pub allowed_roles: Vec<Role>,
    /// Trust `X-Forwarded-For` for the client IP (only behind a proxy)
    pub trust_forwarded_for: bool,
    /// Timeout for calls the console makes to the backend
    pub backend_timeout: Duration,
}

impl ServerConfig {
    pub fn new(api_base: Url, jwt_secret: Vec<u8>) -> Self {
        Self {
            api_base,
            jwt_secret,
            secure_cookies: false,
            allowed_roles: Role::ALL.to_vec(),
            trust_forwarded_for: false,
            backend_timeout: Duration::from_secs(15),
        }
    }
}

/// Create the console router with the given configuration.
///
/// Every route sits behind the request guard; only dashboard paths are
/// actually gated, the rest pass through untouched.
pub fn create_app(config: &ServerConfig) -> Result<Router, reqwest::Error> {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));

    let http = reqwest::Client::builder()
        .timeout(config.backend_timeout)
        .build()?;

    let policy = Arc::new(GuardPolicy::new(config.allowed_roles.iter().copied()));

    let console_state = ConsoleState {
        jwt: jwt.clone(),
        policy: policy.clone(),
        api_base: config.api_base.clone(),
        http,
        secure_cookies: config.secure_cookies,
    };

    let guard_state = GuardState { jwt, policy };

    let rate_limit = RateLimitConfig::new(config.trust_forwarded_for);

    // Login pages: GET renders the form, POST (rate limited) submits it
    let login: MethodRouter<ConsoleState> = get(login_form).merge(
        post(login_submit).layer(middleware::from_fn_with_state(
            rate_limit,
            rate_limit_login_submit,
        )),
    );

    let app = Router::new()
        .route("/", get(Redirect::temporary("/login")))
        .route("/login", login.clone())
        .route("/r/{slug}/login", login.clone())
        .route("/r/{slug}/{role}/login", login)
        .route("/logout", post(logout))
        .route("/dashboard", get(dashboard))
        .route("/dashboard/{*rest}", get(dashboard))
        .route("/r/{slug}/dashboard", get(dashboard))
        .route("/r/{slug}/dashboard/{*rest}", get(dashboard))
        .route("/r/{slug}/{role}/dashboard", get(dashboard))
        .route("/r/{slug}/{role}/dashboard/{*rest}", get(dashboard))
        .with_state(console_state)
        .layer(middleware::from_fn_with_state(guard_state, require_session));

    Ok(app)
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(
    config: ServerConfig,
    listener: TcpListener,
) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
