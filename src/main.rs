//! dmprobe Binary Entry Point
//!
//! Runs the DM8 metrics exporter. Core functionality is provided by the
//! `dmprobe` library crate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dmprobe::{
    collector::Engine,
    config::{AppConfig, parse_duration, redact_dsn},
    server::{AppState, create_router},
    storage::SqlxSource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// dmprobe - DM Database Metrics Exporter
#[derive(Parser, Debug)]
#[command(name = "dmprobe", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "DMPROBE_CONFIG"
    )]
    config: String,

    /// Server bind address (overrides config file)
    #[arg(long, env = "DMPROBE_SERVER_BIND")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "DMPROBE_SERVER_PORT")]
    server_port: Option<u16>,

    /// Database DSN (overrides config file)
    #[arg(long, env = "DMPROBE_DSN")]
    dsn: Option<String>,

    /// Per-query timeout, e.g. `15s` (overrides config file)
    #[arg(long, env = "DMPROBE_QUERY_TIMEOUT", value_parser = parse_duration)]
    query_timeout: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dmprobe=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("dmprobe - DM Database Metrics Exporter");

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // CLI > ENV > config file
    if let Some(bind) = cli.server_bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.server_port {
        config.server.port = port;
    }
    if let Some(dsn) = cli.dsn {
        config.database.dsn = dsn;
    }
    if let Some(timeout) = cli.query_timeout {
        config.engine.query_timeout = timeout;
    }
    config.validate()?;

    tracing::info!(
        "Server: {}:{}, Database: {} (source: {})",
        config.server.bind,
        config.server.port,
        redact_dsn(&config.database.dsn),
        config.engine.data_source,
    );

    let source = SqlxSource::connect(
        config.engine.data_source.clone(),
        &config.database.dsn,
        &config.database.pool_options(),
    )
    .await?;
    tracing::info!("Database pool initialized");

    let engine = Engine::new(config.engine.clone(), Arc::new(source))?;
    tracing::info!(probes = ?engine.probe_names(), "Collection engine ready");

    let app = create_router(AppState {
        engine: Arc::new(engine),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    tracing::info!("Exporter listening on: http://{}/metrics", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve when Ctrl+C or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
