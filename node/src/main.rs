// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Knowledge Hub Node
//!
//! Entry point for the `knowhub-node` binary. Parses CLI arguments,
//! initializes logging and metrics, loads (or bootstraps) the deployment and
//! serves the HTTP/WS API.
//!
//! The binary supports three subcommands:
//!
//! - `init`    — bootstrap a deployment into the data directory
//! - `run`     — serve the deployment
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod service;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;

use knowhub_contracts::deployment::Deployment;
use knowhub_protocol::config::{EVENT_CHANNEL_CAPACITY, PROTOCOL_VERSION};
use knowhub_protocol::storage::SnapshotStore;
use knowhub_protocol::units::format_units;

use cli::{Commands, KnowhubNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;
use service::HubService;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = KnowhubNodeCli::parse();
    let format = LogFormat::from_str_lossy(&cli.log_format);

    match cli.command {
        Commands::Init(args) => {
            logging::init_logging(logging::DEFAULT_FILTER, format);
            init_deployment(args)
        }
        Commands::Run(args) => {
            logging::init_logging(logging::DEFAULT_FILTER, format);
            run_node(args).await
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("db")
}

fn open_store(data_dir: &Path) -> Result<SnapshotStore> {
    let path = db_path(data_dir);
    std::fs::create_dir_all(&path)
        .with_context(|| format!("failed to create database directory: {}", path.display()))?;
    let store = SnapshotStore::open(&path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    tracing::info!(path = %path.display(), "database opened");
    Ok(store)
}

/// Bootstraps a deployment and commits it as the first snapshot.
fn init_deployment(args: cli::InitArgs) -> Result<()> {
    let store = open_store(&args.data_dir)?;

    if !store.is_empty()? {
        if !args.force {
            bail!(
                "{} already holds a deployment; pass --force to replace it",
                args.data_dir.display()
            );
        }
        tracing::warn!(data_dir = %args.data_dir.display(), "replacing existing deployment");
        store.clear()?;
    }

    let config = args.bootstrap_config();
    let deployment = Deployment::bootstrap(&config).context("bootstrap failed")?;
    let sequence = store.commit(&deployment)?;

    println!("Deployment initialized.");
    println!("  Data directory : {}", args.data_dir.display());
    println!("  Sequence       : {}", sequence);
    println!("  Ledger         : {}", deployment.ledger.address());
    println!("  Owner          : {}", deployment.ledger.owner());
    println!("  Hub            : {}", deployment.hub.address());
    println!(
        "  Reward pool    : {} {}",
        format_units(deployment.pool_balance()),
        deployment.ledger.symbol()
    );
    for (account, amount) in &config.test_balances {
        println!("  Funded         : {} = {}", account, format_units(*amount));
    }

    Ok(())
}

/// Serves the deployment until SIGINT or SIGTERM.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting knowhub-node"
    );

    let store = open_store(&args.data_dir)?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Event broadcast ---
    let (feed_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Hub service ---
    let service = HubService::open(
        store,
        &args.bootstrap_config(),
        Arc::clone(&node_metrics),
        feed_tx,
    )
    .context("failed to load deployment")?;
    let service = Arc::new(service);
    service.read(|d| {
        tracing::info!(
            hub = %d.hub.address(),
            ledger = %d.ledger.address(),
            entries = d.hub.get_entry_count(),
            pool = %format_units(d.pool_balance()),
            "deployment ready"
        );
    });

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION,
        ),
        service,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.bind, args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.bind, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("knowhub-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("knowhub-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {}", PROTOCOL_VERSION);
    println!(
        "snapshot     v{}",
        knowhub_protocol::config::SNAPSHOT_FORMAT_VERSION
    );
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed the node keeps running until the other signal arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
