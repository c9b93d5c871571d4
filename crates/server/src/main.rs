//! Relay server binary.
//!
//! Starts an axum HTTP server with structured logging and graceful shutdown
//! on SIGTERM/SIGINT.

#[macro_use]
extern crate tracing;

use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tonelink_server::config::{self, Config};
use tonelink_server::{AppState, app};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH_VAR: &str = "TONELINK_CONFIG_PATH";

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }
    if let Some(path) = std::env::var(CONFIG_PATH_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "env-var");
    }
    (None, "default")
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let (config_path, config_source) = resolve_config_path();
    let selected_path = config_path.as_deref().unwrap_or("tonelink.toml");

    let config = match config::load_config(Some(selected_path)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config);
    info!(
        source = config_source,
        path = selected_path,
        "resolved startup configuration path"
    );

    let state = AppState::from_config(&config.providers);
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%addr, "failed to bind: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!(%addr, "starting tonelink relay");

    if let Err(err) = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {err}");
        return ExitCode::FAILURE;
    }
    info!("tonelink relay shut down");
    ExitCode::SUCCESS
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, initiating graceful shutdown"),
        () = terminate => info!("received SIGTERM, initiating graceful shutdown"),
    }
}
