//! Tank Arena Server - Authoritative multiplayer tank battle server
//!
//! This is the main entry point for the arena server. It handles:
//! - WebSocket connections for players and observers
//! - The fixed-rate tick loop that owns the arena
//! - A health endpoint for monitoring

mod app;
mod config;
mod game;
mod http;
mod session;
mod util;
mod ws;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::{FrameClock, World};
use crate::http::build_router;
use crate::session::SessionRegistry;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Tank Arena Server");
    info!("Server address: {}", config.server_addr);

    // The registry hands new sessions to the tick loop
    let (registry, events) = SessionRegistry::new(&config.server);
    let world = World::new(config.game.clone());
    let clock = FrameClock::new(world, events, &config.server);
    let mut tick_loop = tokio::spawn(clock.run());

    let config = Arc::new(config);
    let state = AppState::new(Arc::clone(&config), registry);
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Player endpoint: ws://{}{}", addr, config.server.player_path);
    info!("Observer endpoint: ws://{}{}", addr, config.server.observer_path);

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    tokio::select! {
        result = server => result?,
        result = &mut tick_loop => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Tick loop stopped");
                    return Err(e.into());
                }
                Err(e) => {
                    error!(error = %e, "Tick loop panicked");
                    return Err(e.into());
                }
            }
        }
    }

    tick_loop.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
