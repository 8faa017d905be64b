//! CLI argument parsing, validation, and the session commands.

use crate::ServerConfig;
use crate::client::{ApiClient, ClientError};
use crate::jwt::{Role, peek_claims};
use crate::session::{FileTokenStore, TokenStore};
use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Failure of a session command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("backend accepted the login but issued no token")]
    NoToken,

    #[error("--data is not valid JSON: {0}")]
    InvalidBody(serde_json::Error),

    #[error("failed to print response: {0}")]
    Output(serde_json::Error),
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "restaurantos",
    about = "Restaurant console with token-guarded dashboards"
)]
pub struct Args {
    /// Base URL of the restaurant backend
    #[arg(
        long,
        env = "RESTAURANTOS_API_BASE",
        default_value = "http://localhost:4000",
        global = true
    )]
    pub api_base: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the console (login pages and guarded dashboards)
    Serve(ServeArgs),
    /// Log in against the backend and store the session locally
    Login(LoginArgs),
    /// End the stored session
    Logout(SessionArgs),
    /// Show role and tenant of the stored token, without verifying it
    Whoami(SessionArgs),
    /// Call a backend endpoint with the stored session
    Request(RequestArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "7300")]
    pub port: u16,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Role admitted to dashboards; repeat for several. Defaults to every role
    #[arg(long = "allowed-role")]
    pub allowed_roles: Vec<Role>,

    /// Set the Secure flag on the session cookie (use behind HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Rate limit by the first X-Forwarded-For entry (only behind a trusted proxy)
    #[arg(long)]
    pub trust_forwarded_for: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    /// Where the session is kept between invocations
    #[arg(
        long,
        env = "RESTAURANTOS_SESSION_FILE",
        default_value = ".restaurantos-session.json"
    )]
    pub session_file: PathBuf,

    /// Tenant slug sent as x-tenant-slug
    #[arg(long)]
    pub tenant: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct LoginArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[arg(long)]
    pub email: String,

    #[arg(long, env = "RESTAURANTOS_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RequestArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET", value_parser = parse_method)]
    pub method: Method,

    /// JSON request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Backend path, e.g. /api/admin/menu
    pub path: String,
}

fn parse_method(s: &str) -> Result<Method, String> {
    Method::from_bytes(s.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("Invalid HTTP method: {}", s))
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // SAFETY: called during startup before the runtime spawns any task,
        // and nothing else reads JWT_SECRET.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required to verify session tokens. Set JWT_SECRET (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate the backend base URL.
/// Returns None and logs an error if validation fails.
pub fn validate_api_base(api_base: &str) -> Option<Url> {
    let url = match Url::parse(api_base) {
        Ok(url) => url,
        Err(e) => {
            error!(api_base = %api_base, error = %e, "Invalid api-base URL");
            return None;
        }
    };

    if !matches!(url.scheme(), "http" | "https") {
        error!(api_base = %api_base, "api-base must be an http or https URL");
        return None;
    }

    Some(url)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(api_base: Url, jwt_secret: String, serve: &ServeArgs) -> ServerConfig {
    let mut config = ServerConfig::new(api_base, jwt_secret.into_bytes());
    config.secure_cookies = serve.secure_cookies;
    config.trust_forwarded_for = serve.trust_forwarded_for;
    if !serve.allowed_roles.is_empty() {
        config.allowed_roles = serve.allowed_roles.clone();
    }
    config
}

/// Parse the `--data` argument of `request`.
fn parse_body(data: Option<&str>) -> Result<Option<Value>, CommandError> {
    data.map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(CommandError::InvalidBody)
}

fn session_client(api_base: Url, session: &SessionArgs) -> Result<ApiClient, ClientError> {
    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&session.session_file));
    let mut builder = ApiClient::builder(api_base, store);
    if let Some(tenant) = &session.tenant {
        builder = builder.tenant(tenant.clone());
    }
    builder.build()
}

/// Run one of the session commands. `Serve` is handled by the binary.
pub async fn run_session_command(api_base: Url, command: Command) -> Result<(), CommandError> {
    match command {
        Command::Serve(_) => Ok(()),
        Command::Login(args) => {
            let client = session_client(api_base, &args.session)?;
            let auth = client.login(&args.email, &args.password).await?;
            if auth.token.is_none() {
                return Err(CommandError::NoToken);
            }
            info!(session_file = %args.session.session_file.display(), "Session stored");
            Ok(())
        }
        Command::Logout(session) => {
            let client = session_client(api_base, &session)?;
            Ok(client.logout().await?)
        }
        Command::Whoami(session) => {
            let store = FileTokenStore::new(&session.session_file);
            match store.get_token().as_deref().and_then(peek_claims) {
                Some(claims) => {
                    println!("role:   {}", claims.role);
                    println!("tenant: {}", claims.tenant_slug.as_deref().unwrap_or("-"));
                    println!("expiry: {}", claims.exp);
                }
                None => println!("Not logged in"),
            }
            Ok(())
        }
        Command::Request(args) => {
            let client = session_client(api_base, &args.session)?;
            let body = parse_body(args.data.as_deref())?;
            match client.request(args.method, &args.path, body.as_ref()).await? {
                Some(value) => {
                    let pretty =
                        serde_json::to_string_pretty(&value).map_err(CommandError::Output)?;
                    println!("{}", pretty);
                }
                None => println!("(no content)"),
            }
            Ok(())
        }
    }
}
