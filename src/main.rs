mod api;
mod config;
mod reminder;
mod scheduler;
mod service;
mod sink;
mod store;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;

use crate::scheduler::{Scheduler, SystemClock};
use crate::service::ReminderService;
use crate::sink::HttpSink;
use crate::store::FileStore;

#[derive(Parser)]
#[command(
    name = "pillbox",
    version,
    about = "Medication reminder scheduler backend"
)]
struct Cli {
    #[arg(short, long, default_value = "~/.pillbox/config.toml")]
    config: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server and reminder watchers
    Run,
    /// Create ~/.pillbox/ with a starter config
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Init => {
            config::init_config_dir().await?;
            tracing::info!("Initialized ~/.pillbox/");
        }
        Commands::Run => run(&cli.config).await?,
    }
    Ok(())
}

async fn run(config_path: &str) -> Result<()> {
    let cfg = config::load(config_path)?;

    let store = Arc::new(FileStore::new(&cfg.store.base_dir)?);
    let sink = Arc::new(HttpSink::new(&cfg.sink)?);
    let scheduler = Arc::new(Scheduler::new(sink, Arc::new(SystemClock), &cfg.scheduler));
    let service = Arc::new(ReminderService::new(store, scheduler));

    // Seeding must succeed before the process is considered healthy.
    let seeded = service.load_and_seed().await?;
    tracing::info!("Watching {seeded} existing reminders");

    let state = api::AppState { service };
    let listener = tokio::net::TcpListener::bind(&cfg.api.bind).await?;
    tracing::info!("pillbox listening on {}", cfg.api.bind);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
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
    tracing::info!("Shutting down");
}
