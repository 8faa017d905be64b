use std::net::SocketAddr;

use clap::Parser;
use restaurantos::cli::{
    Args, Command, ServeArgs, build_config, init_logging, load_jwt_secret, run_session_command,
    validate_api_base,
};
use restaurantos::create_app;
use tracing::{error, info};
use url::Url;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(api_base) = validate_api_base(&args.api_base) else {
        std::process::exit(1);
    };

    match args.command {
        Command::Serve(serve) => serve_console(api_base, serve).await,
        command => {
            if let Err(e) = run_session_command(api_base, command).await {
                error!(error = %e, "Command failed");
                std::process::exit(1);
            }
        }
    }
}

async fn serve_console(api_base: Url, serve: ServeArgs) {
    let Some(jwt_secret) = load_jwt_secret(serve.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", serve.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    let config = build_config(api_base, jwt_secret, &serve);
    let app = create_app(&config).unwrap_or_else(|e| {
        error!(error = %e, "Failed to build backend HTTP client");
        std::process::exit(1);
    });

    info!(
        address = %local_addr,
        api_base = %config.api_base,
        roles = ?config.allowed_roles,
        "Listening"
    );

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
