//! panel-sync - Control-panel synchronization for a hosting-reseller back office
//!
//! This is the main entry point for the panel-sync service.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use panel_sync::config::Config;
use panel_sync::database::{Database, SqliteDatabase};
use panel_sync::providers::ProviderFactory;
use panel_sync::server::{AppState, Server};
use panel_sync::sync::{QueueScheduler, RetryQueue, SyncOrchestrator};

/// panel-sync - Control-panel synchronization for a hosting-reseller back office
#[derive(Parser, Debug)]
#[command(name = "panel-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "PANEL_SYNC_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;

    init_tracing(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting panel-sync"
    );

    // Initialize database
    let database: Arc<dyn Database> = Arc::new(SqliteDatabase::new(&config.database.path).await?);
    info!(path = %config.database.path, "Database initialized");

    // Wire the sync core
    let factory = Arc::new(ProviderFactory::new(
        Arc::clone(&database),
        config.enhance.clone(),
    ));
    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::clone(&database),
        Arc::clone(&factory),
    ));
    let queue = Arc::new(RetryQueue::new(
        Arc::clone(&database),
        Arc::clone(&orchestrator),
        config.queue.clone(),
    ));

    // Shutdown fan-out for background tasks
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Background queue processor
    let mut scheduler_task = None;
    if config.scheduler.enabled {
        let runner: Arc<dyn panel_sync::sync::QueueRunner> = queue.clone();
        let scheduler = QueueScheduler::new(
            config.scheduler.clone(),
            runner,
            config.queue.batch_limit as usize,
            shutdown_tx.subscribe(),
        );
        scheduler_task = Some(tokio::spawn(scheduler.run()));
        info!(
            interval_secs = config.scheduler.process_interval_secs,
            "Queue scheduler started"
        );
    }

    // HTTP server
    let state = AppState {
        database,
        orchestrator,
        queue,
        factory,
    };
    let server = Server::new(config.server.clone(), state);

    let shutdown_for_server = shutdown_tx.clone();
    let server_task = tokio::spawn(async move {
        server
            .run(async move {
                let mut rx = shutdown_for_server.subscribe();
                let _ = rx.recv().await;
            })
            .await
    });

    // Wait for ctrl-c, then fan out shutdown
    signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());

    if let Some(task) = scheduler_task {
        let _ = task.await;
    }
    server_task.await??;

    info!("panel-sync stopped");
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
