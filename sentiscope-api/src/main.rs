//! SentiScope API (sentiscope-api) - Main entry point
//!
//! Sentiment-analysis backend: text, CSV and image ingestion, per-user
//! history, reports and chat over saved analyses.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sentiscope_common::config::{load_toml_config, resolve_root_folder, RootFolder};
use sentiscope_common::db::init_database;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentiscope_api::config::{log_filter_directive, CliOverrides, ServiceConfig, DEFAULT_LOG_FILTER};
use sentiscope_api::services::TesseractClient;
use sentiscope_api::{build_router, AppState, Backends};

/// Command-line arguments for sentiscope-api
#[derive(Parser, Debug)]
#[command(name = "sentiscope-api")]
#[command(about = "Sentiment analysis API for SentiScope")]
#[command(version)]
struct Args {
    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Root folder holding the database, uploads and stored files
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Origin allowed by CORS
    #[arg(long)]
    frontend_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env before anything reads the environment
    dotenv::dotenv().ok();

    let args = Args::parse();

    // TOML is read before tracing starts so `[logging] level` can seed the filter
    let toml_result = load_toml_config(args.config.as_deref());
    let default_filter = toml_result
        .as_ref()
        .map(log_filter_directive)
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&default_filter))
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting SentiScope API (sentiscope-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Missing or unreadable TOML falls back to defaults
    let toml_config = match toml_result {
        Ok(config) => config,
        Err(e) => {
            warn!("Could not load config file, using defaults: {}", e);
            Default::default()
        }
    };

    let root = RootFolder::new(resolve_root_folder(args.root_folder.as_deref(), &toml_config));
    root.ensure_directories()
        .context("Failed to create root folder directories")?;
    info!("Root folder: {}", root.path().display());

    let db_pool = init_database(&root.database_path())
        .await
        .context("Failed to initialize database")?;
    info!("Database ready: {}", root.database_path().display());

    let cli = CliOverrides {
        host: args.host,
        port: args.port,
        frontend_url: args.frontend_url,
    };
    let config = ServiceConfig::resolve(&cli, &toml_config, root);

    if config.huggingface_api_key.is_none() {
        warn!("HUGGINGFACE_API_KEY is not set; sentiment requests will fail");
    }
    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; deep analysis, insights and chat are disabled");
    }
    if let Err(e) = TesseractClient::new(config.tesseract_binary.clone()).check_available().await {
        warn!("Image analysis unavailable: {}", e);
    }

    let backends = Backends::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to build service clients: {}", e.message))?;

    let bind_address = config.bind_address();
    let state = AppState::new(db_pool, config, backends);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("Listening on http://{}", bind_address);

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
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
