// ABOUTME: Entry point for the filtertrail binary.
// ABOUTME: Parses CLI arguments, loads .env and config, initializes tracing, and runs serve, export or reset.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use filtertrail_core::{Command, TrailState};
use filtertrail_monitor::{ScriptedSource, spawn_monitor};
use filtertrail_server::{AppState, TrailConfig, create_router};
use filtertrail_store::{LoadSource, StorageManager};

/// Record how a live table's filters narrow its rows, step by step.
#[derive(Parser)]
#[command(name = "filtertrail", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API for the stored trail.
    Serve {
        /// Socket address to bind, overriding FILTERTRAIL_BIND.
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Monitor a JSON-lines feed of snapshots while serving.
        #[arg(long)]
        feed: Option<PathBuf>,
    },

    /// Write flow.dot, flow.json and table.md for the stored trail.
    Export,

    /// Discard the stored trail, primary and backup.
    Reset,
}

/// Load the stored log into a fresh TrailState configured from `config`.
fn load_state(config: &TrailConfig, storage: &StorageManager) -> TrailState {
    let report = storage.log_store().load();
    match report.source {
        LoadSource::Primary => {}
        LoadSource::Backup => tracing::warn!("primary log unreadable, resumed from backup"),
        LoadSource::Empty => tracing::info!("no stored trail, starting empty"),
    }
    tracing::info!(events = report.events.len(), "loaded filter trail");

    TrailState::with_events(report.events)
        .with_thresholds(config.thresholds)
        .with_history_cap(config.history_cap)
        .with_max_columns(config.max_columns)
}

async fn serve(
    config: TrailConfig,
    bind: Option<SocketAddr>,
    feed: Option<PathBuf>,
) -> anyhow::Result<()> {
    let storage = StorageManager::new(config.home.clone())
        .with_context(|| format!("failed to prepare {}", config.home.display()))?;
    let state = load_state(&config, &storage);
    let trail = filtertrail_core::spawn(state, Arc::new(storage.log_store()));

    let monitor = match feed {
        Some(path) => {
            let source = ScriptedSource::from_jsonl(&path)
                .with_context(|| format!("failed to read feed {}", path.display()))?;
            Some(spawn_monitor(
                Arc::new(source),
                trail.clone(),
                config.monitor_config(),
            ))
        }
        None => None,
    };

    let app_state = match &monitor {
        Some(handle) => AppState::new(trail.clone(), storage, handle.subscribe_status()),
        None => AppState::without_monitor(trail.clone(), storage),
    };
    let router = create_router(Arc::new(app_state));

    let addr = bind.unwrap_or(config.bind);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "filtertrail listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
        .context("server error")?;

    if let Some(handle) = monitor {
        handle.stop().await;
    }
    trail
        .send_command(Command::Save)
        .await
        .context("final save failed")?;
    tracing::info!("filtertrail stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("filtertrail=debug,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = TrailConfig::from_env()?;

    match cli.command {
        Commands::Serve { bind, feed } => serve(config, bind, feed).await?,
        Commands::Export => {
            let storage = StorageManager::new(config.home.clone())?;
            let state = load_state(&config, &storage);
            let paths = storage.write_exports(&state)?;
            println!("{}", serde_json::to_string_pretty(&paths)?);
        }
        Commands::Reset => {
            let storage = StorageManager::new(config.home.clone())?;
            storage.log_store().reset()?;
            println!("Reset filter trail in {}", storage.trail_dir().display());
        }
    }
    Ok(())
}
