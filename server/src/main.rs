//! fourstack game server
//!
//! Serves one two-seat Connect Four room over a WebSocket endpoint:
//! - `GET /game?userId=<id>` - join (or reconnect to) the game
//! - anything else          - static frontend files
//!
//! All game mutation is serialized through the session task; connections
//! only shuttle frames between their player and that task.

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::services::ServeDir;
use tracing::info;

mod config;
mod room;
mod session;

use config::Config;
use room::GameRoom;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    Ok(())
}

/// Completes when Ctrl+C arrives.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    info!("shutdown signal received, stopping server...");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;
    init_tracing(&config.log_level)?;

    info!(
        host = %config.host,
        port = config.port,
        policy = %config.duplicate_policy,
        "starting server"
    );

    let session = session::spawn();
    let room = GameRoom::new(session, config.duplicate_policy);

    let app = Router::new()
        .route("/game", get(room::connect))
        .with_state(room)
        .fallback_service(ServeDir::new(&config.static_dir));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down gracefully");
    Ok(())
}
