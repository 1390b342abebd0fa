//! checkd — the steamcheck worker daemon.
//!
//! Drains a shared work queue of Steam identifiers, runs the fixed
//! battery of profile checks for each, and records progress so that
//! rate limits and connectivity failures defer work instead of losing
//! it.
//!
//! # Usage
//!
//! ```text
//! checkd run --config checkd.toml
//! checkd inspect --config checkd.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use check_cooldown::CooldownController;
use check_queue::QueueClient;
use check_store::CheckStore;
use checkd::coordinator::Coordinator;
use checkd::executor::HttpCheckExecutor;
use checkd::probe::HttpExistenceProbe;
use checkd::status::{build_router, status_payload, StatusState};

#[derive(Parser)]
#[command(name = "checkd", about = "Steam profile check worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker daemon.
    Run {
        /// Path to the configuration file.
        #[arg(long, default_value = "checkd.toml")]
        config: PathBuf,
    },

    /// Print persisted worker state without touching it.
    Inspect {
        /// Path to the configuration file.
        #[arg(long, default_value = "checkd.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,checkd=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => run(config).await,
        Command::Inspect { config } => inspect(config).await,
    }
}

fn load_config(path: &PathBuf) -> check_core::CheckdConfig {
    if path.exists() {
        match check_core::CheckdConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(?path, error = %e, "failed to parse config, using defaults");
                check_core::CheckdConfig::default()
            }
        }
    } else {
        warn!(?path, "config file not found, using defaults");
        check_core::CheckdConfig::default()
    }
}

async fn run(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&config_path);
    info!("checkd starting");

    // ── Initialize subsystems ──────────────────────────────────

    let queue = match &config.queue {
        Some(queue_config) => {
            let client = Arc::new(QueueClient::new(queue_config)?);
            info!(
                base_url = %queue_config.base_url,
                instance_id = %queue_config.instance_id,
                "queue client initialized"
            );
            Some(client)
        }
        None => {
            warn!("no queue configured, draining local work only");
            None
        }
    };

    let mut store = CheckStore::open(&config.storage.state_file);
    if let Some(client) = &queue {
        store = store.with_queue(client.clone());
    }
    info!(path = ?config.storage.state_file, profiles = store.len(), "check store opened");

    let cooldowns = CooldownController::open(
        &config.storage.cooldown_file,
        config.cooldowns.clone(),
        config.backoff_sequence(),
    );
    info!(path = ?config.storage.cooldown_file, "cooldown controller initialized");

    let executor = Arc::new(HttpCheckExecutor::new(config.upstream.clone())?);

    let mut coordinator = Coordinator::new(store, cooldowns, executor);
    if let Some(client) = &queue {
        coordinator = coordinator.with_queue(client.clone());
    }
    if let Some(probe_config) = &config.probe {
        let probe = Arc::new(HttpExistenceProbe::new(probe_config)?);
        info!(base_url = %probe_config.base_url, "existence probe initialized");
        coordinator = coordinator.with_probe(probe);
    }
    if let Some(queue_config) = &config.queue {
        coordinator = coordinator.with_claim_batch(queue_config.claim_batch);
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let coordinator_handle = tokio::spawn(coordinator.run(
        Duration::from_millis(config.daemon.poll_interval_ms),
        Duration::from_millis(config.daemon.sweep_interval_ms),
        shutdown_rx.clone(),
    ));

    let status_handle = match config.daemon.status_port {
        Some(port) => {
            let router = build_router(StatusState {
                state_file: config.storage.state_file.clone(),
                cooldown_file: config.storage.cooldown_file.clone(),
            });
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "status API listening");

            let mut shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                    let _ = shutdown.changed().await;
                });
                if let Err(e) = server.await {
                    warn!(error = %e, "status API stopped with error");
                }
            }))
        }
        None => None,
    };

    // ── Wait for shutdown ──────────────────────────────────────

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = coordinator_handle.await;
    if let Some(handle) = status_handle {
        let _ = handle.await;
    }

    info!("checkd stopped");
    Ok(())
}

async fn inspect(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&config_path);

    let mut payload = status_payload(&StatusState {
        state_file: config.storage.state_file.clone(),
        cooldown_file: config.storage.cooldown_file.clone(),
    });

    if let Some(queue_config) = &config.queue {
        let client = QueueClient::new(queue_config)?;
        if let Some(stats) = client.stats().await {
            payload["queue"] = stats;
        }
    }

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
