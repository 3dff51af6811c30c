//! outreach-campaigns - Outreach campaign microservice
//!
//! Manages cold-outreach campaigns (sequences, contacts, pipeline stages)
//! and sends sequence steps to eligible contacts over an HTTP email provider.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use outreach_campaigns::services::build_transport;
use outreach_campaigns::AppState;

/// Command-line arguments for outreach-campaigns
#[derive(Parser, Debug)]
#[command(name = "outreach-campaigns")]
#[command(about = "Outreach campaign microservice")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "OUTREACH_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "OUTREACH_PORT")]
    port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(long, env = "OUTREACH_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// SQLite database path (overrides config)
    #[arg(short, long, env = "OUTREACH_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = outreach_common::config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind_address) = args.bind_address {
        config.bind_address = bind_address;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "outreach_campaigns={level},outreach_common={level},tower_http={level}",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting outreach-campaigns v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Database: {}", config.database_path.display());
    info!("Site URL: {}", config.site_url);

    let db_pool = outreach_campaigns::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let transport = build_transport(&config.email).context("Failed to build email transport")?;
    info!(
        transport = transport.name(),
        send_delay_ms = config.send_delay_ms,
        "Email transport ready"
    );

    let state = AppState::from_config(db_pool, &config, transport)
        .context("Failed to compile email templates")?;
    let app = outreach_campaigns::build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
