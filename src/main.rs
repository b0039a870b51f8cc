//! Tank Arena Server entry point
//!
//! Loads configuration, starts the session writer and serves the HTTP and
//! WebSocket endpoints until a shutdown signal arrives.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tank_arena_server::app::AppState;
use tank_arena_server::config::Config;
use tank_arena_server::http::build_router;
use tank_arena_server::store::{JsonlSink, LogSink, SessionRecorder, SessionSink};
use tank_arena_server::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level);
    init_server_time();

    info!("Starting Tank Arena Server");
    info!(
        tick_rate = config.game.tick.tick_rate,
        snapshot_rate = config.game.tick.snapshot_rate,
        capacity = config.game.room.capacity,
        difficulty = %config.game.ai.difficulty,
        "Game configuration"
    );

    // Session history goes to a file when configured, otherwise to the log
    let sink: Box<dyn SessionSink> = match &config.session_log_path {
        Some(path) => {
            info!(path = %path.display(), "Writing session log");
            Box::new(JsonlSink::open(path)?)
        }
        None => Box::new(LogSink),
    };
    let (recorder, writer) = SessionRecorder::spawn(sink);

    let state = AppState::new(config.clone(), Some(recorder));
    let rooms = state.rooms.clone();
    let router = build_router(state);

    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Rooms hold recorder clones; the writer drains once they are gone
    rooms.shutdown_all().await;
    drop(rooms);
    if let Err(e) = tokio::time::timeout(std::time::Duration::from_secs(5), writer).await {
        warn!(error = %e, "Session writer did not finish in time");
    }

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
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install terminate handler");
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
