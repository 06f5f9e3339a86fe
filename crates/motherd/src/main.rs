mod auth;
mod telemetry;
mod web;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use motherconf::MotherConfig;
use motherlib::{FileStore, RecordStore};
use tokio_util::sync::CancellationToken;

/// The Mothership record store daemon
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file path (overrides ./mothership.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the record snapshot (overrides config)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Content store directory (overrides config)
    #[arg(long)]
    cas_dir: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the effective config and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = MotherConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(state_dir) = cli.state_dir {
        config.paths.state_dir = state_dir;
    }
    if let Some(cas_dir) = cli.cas_dir {
        config.paths.cas_dir = cas_dir;
    }
    if let Some(port) = cli.port {
        config.bind.http_port = port;
    }

    if cli.print_config {
        println!("{}", config.to_toml());
        return Ok(());
    }

    telemetry::init(&config.telemetry.log_level);
    for file in &sources.files {
        tracing::info!("Loaded config from {}", file.display());
    }
    for var in &sources.env_overrides {
        tracing::debug!("Config override from {var}");
    }

    std::fs::create_dir_all(&config.paths.state_dir)
        .context("Failed to create state directory")?;
    tracing::info!("Using state directory: {}", config.paths.state_dir.display());

    // --- CAS Initialization ---
    tracing::info!("Initializing content store...");
    let cas = Arc::new(
        cas::FileStore::at_path(&config.paths.cas_dir).context("Failed to open content store")?,
    );
    tracing::info!("   CAS ready at: {}", config.paths.cas_dir.display());

    // --- Record Store Initialization ---
    tracing::info!("Initializing record store...");
    let snapshot_path = config.paths.snapshot_path();
    let store: Arc<dyn RecordStore> = Arc::new(
        FileStore::open(&snapshot_path, cas).context("Failed to open record store")?,
    );
    tracing::info!(
        "   Record snapshot at: {} ({} records)",
        snapshot_path.display(),
        store.record_count()
    );

    if config.auth.single_tenant() {
        tracing::warn!("No auth tokens configured; running single-tenant");
    } else {
        tracing::info!("Auth tokens configured: {}", config.auth.tokens.len());
    }

    let addr = format!("{}:{}", config.bind.http_addr, config.bind.http_port);
    tracing::info!("Mothership starting on http://{}", addr);
    tracing::info!("   Records: PUT/GET http://{}/latest?tags=...", addr);
    tracing::info!("   History: GET/DELETE http://{}/history?tags=...", addr);
    tracing::info!("   Superset: GET http://{}/superset/latest?tags=...", addr);
    tracing::info!("   Blobs: GET http://{}/blob/{{digest}}", addr);
    tracing::info!("   Moves: POST http://{}/move", addr);
    tracing::info!("   Health: GET http://{}/health", addr);

    let state = web::WebState {
        store: store.clone(),
        auth: Arc::new(config.auth.clone()),
        started: Instant::now(),
    };
    let app_router = web::router(state);

    let bind_addr: std::net::SocketAddr = addr.parse().context("Failed to parse bind address")?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    let shutdown_token = CancellationToken::new();
    let shutdown_token_srv = shutdown_token.clone();
    let server = axum::serve(listener, app_router).with_graceful_shutdown(async move {
        shutdown_token_srv.cancelled().await;
        tracing::info!("Server shutdown signal received");
    });

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!("Server shutdown with error: {:?}", e);
        }
    });

    tracing::info!("Server ready");

    // Handle both SIGINT (Ctrl+C) and SIGTERM (systemd, etc.)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            shutdown_token.cancel();
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
            shutdown_token.cancel();
        }
    }

    server_task.await.context("Server task panicked")?;

    // Last snapshot write before exit.
    if let Err(e) = store.flush() {
        tracing::warn!("Failed to flush record store: {e}");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
