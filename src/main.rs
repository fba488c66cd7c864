//! Mirror tadpoles.com event attachments into object storage.
//!
//! Walks the remote event feed in time windows starting from a persisted
//! checkpoint, embeds capture metadata into image attachments, and uploads
//! everything to a filesystem or HTTP object store. Built for unattended
//! scheduled runs: every run is bracketed in a local SQLite history and a
//! failed run leaves a checkpoint the next invocation resumes from.

#![warn(clippy::all)]

mod auth;
mod cli;
mod config;
mod pipeline;
mod state;
mod storage;
mod sync;
mod tadpoles;
mod types;

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use auth::{SessionProvider, DEFAULT_USER_AGENT};
use config::{Config, StoreBackend};
use state::{SqliteStateDb, StateDb};
use storage::{FsObjectStore, HttpObjectStore, ObjectStore};
use sync::SyncController;
use tadpoles::{EventsClient, TADPOLES_BASE_URL};

/// How long one remote call may take before the client gives up.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Print the most recent sync runs, newest first.
async fn print_history(db: &dyn StateDb) -> anyhow::Result<()> {
    let runs = db.recent_sync_runs(20).await?;
    if runs.is_empty() {
        println!("No sync runs recorded yet.");
        return Ok(());
    }

    for run in runs {
        let outcome = run.outcome.map(|o| o.as_str()).unwrap_or("interrupted");
        let finished = run
            .finished_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "#{:<4} {:11} {:11} started {}  finished {}",
            run.id,
            run.mode,
            outcome,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            finished
        );
        println!(
            "      windows={} events={} uploaded={} degraded={}",
            run.stats.windows_scanned,
            run.stats.events_seen,
            run.stats.attachments_uploaded,
            run.stats.annotations_degraded
        );
        if let Some(error) = &run.error {
            println!("      error: {}", error);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = Config::from_cli(cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .init();
    tracing::debug!(?config, "Configuration resolved");

    if let Some(dir) = config.state_db.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let state = Arc::new(SqliteStateDb::open(&config.state_db).await?);

    if config.history {
        return print_history(state.as_ref()).await;
    }

    let client = reqwest::Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(HTTP_TIMEOUT)
        .build()?;

    let state_db: Arc<dyn StateDb> = state;
    let provider = SessionProvider::new(
        client.clone(),
        TADPOLES_BASE_URL.to_string(),
        state_db.clone(),
        config.uid.clone(),
        config.cookie.clone(),
        std::io::stdin().is_terminal(),
    );
    let creds = provider.obtain().await?;

    let events_client = Arc::new(EventsClient::new(client.clone(), TADPOLES_BASE_URL, &creds)?);

    let store: Arc<dyn ObjectStore> = match &config.backend {
        StoreBackend::Fs { root } => {
            let root = root.join(&config.bucket);
            tracing::info!(root = %root.display(), "Storing objects on the local filesystem");
            Arc::new(FsObjectStore::new(root))
        }
        StoreBackend::Http { base_url, token } => {
            tracing::info!(%base_url, bucket = %config.bucket, "Storing objects via HTTP gateway");
            Arc::new(HttpObjectStore::new(
                client,
                base_url.clone(),
                &config.bucket,
                token.clone(),
            ))
        }
    };

    let controller = SyncController::new(
        state_db,
        events_client,
        store,
        config.days,
        config.no_progress_bar,
    );
    let report = controller.run(config.full).await?;

    tracing::info!(
        mode = %report.mode,
        uploaded = report.stats.attachments_uploaded,
        "tadpoles-sync finished"
    );
    Ok(())
}
