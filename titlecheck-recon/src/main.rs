//! titlecheck-recon - Land Registry Response Reconciliation Service
//!
//! Watches a mailbox for the authority's asynchronous ownership-verification
//! responses, pairs the results spreadsheet with its title deeds archive,
//! and reconciles both back into the case-record store. Polling runs on a
//! timer; the HTTP surface exposes health plus manual poll and reconcile
//! triggers with identical logic.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use titlecheck_common::Settings;
use titlecheck_recon::clients::{
    FsObjectStore, GraphMailbox, Session, WebApiCaseStore,
};
use titlecheck_recon::services::{InboxWatcher, Reconciler};
use titlecheck_recon::AppState;

#[derive(Debug, Parser)]
#[command(name = "titlecheck-recon", about = "Land registry response reconciliation service")]
struct Args {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Override the HTTP bind address from the config
    #[arg(long)]
    bind: Option<String>,

    /// Run a single polling cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting titlecheck-recon");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::load_or_default(args.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load settings: {}", e))?;
    if let Some(bind) = args.bind {
        settings.bind_address = bind;
    }
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid settings: {}", e))?;

    // Collaborator clients. Credentials come from the environment; the
    // session object owns all token state.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;
    let session = Arc::new(Session::new(
        http.clone(),
        settings.token_url.clone(),
        env_or_warn("TITLECHECK_CLIENT_ID"),
        env_or_warn("TITLECHECK_CLIENT_SECRET"),
        std::env::var("TITLECHECK_SCOPE").unwrap_or_default(),
    ));

    let store = Arc::new(FsObjectStore::new(settings.blob_root.clone())?);
    let mailbox = Arc::new(GraphMailbox::new(
        http.clone(),
        session.clone(),
        settings.mailbox_base_url.clone(),
    ));
    let cases = Arc::new(WebApiCaseStore::new(
        http,
        session,
        settings.case_store_base_url.clone(),
    ));

    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        cases,
        mailbox.clone(),
        settings.clone(),
    ));
    let watcher = Arc::new(InboxWatcher::new(
        mailbox,
        store,
        reconciler.clone(),
        settings.clone(),
    ));

    // Pick up pairs claimed but not finished by a previous run
    match watcher.recover_pairs().await {
        Ok(0) => {}
        Ok(count) => info!(count, "Recovered unfinished pairs"),
        Err(e) => warn!("Pair recovery failed: {}", e),
    }

    if args.once {
        let summary = watcher.run_cycle().await?;
        info!(
            ingested = summary.ingested,
            pairs = summary.pairs_processed,
            "Single cycle complete"
        );
        return Ok(());
    }

    // Timer-driven polling; a failed cycle is retried on the next tick
    let poll_watcher = watcher.clone();
    let poll_interval = Duration::from_secs(settings.poll_interval_secs);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(poll_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            match poll_watcher.run_cycle().await {
                Ok(summary) => {
                    if summary.ingested > 0 || summary.pairs_processed > 0 {
                        info!(
                            ingested = summary.ingested,
                            unclassified = summary.unclassified,
                            pairs = summary.pairs_processed,
                            "Polling cycle complete"
                        );
                    }
                }
                Err(e) => error!("Polling cycle failed: {}", e),
            }
        }
    });

    let state = AppState::new(watcher, reconciler);
    let app = titlecheck_recon::build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address).await?;
    info!("Listening on http://{}", settings.bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}

fn env_or_warn(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        warn!("{} not set; authenticated collaborators will reject requests", name);
        String::new()
    })
}
