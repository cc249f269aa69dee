// src/bin/persister.rs

//! Persist stage binary: drains the processed queue and upserts every item
//! into Postgres by its natural key. Also serves the query endpoints over
//! the stored records.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use LinkSifter::config::persister::Args;
use LinkSifter::error::Result;
use LinkSifter::queue::{QueueStore, RedisListStore};
use LinkSifter::runner::{CancelFlag, RunnerOptions, RunnerTrigger, StageRunner, StageTrigger};
use LinkSifter::server::{self, persister_router, AppState};
use LinkSifter::stages::PersistStage;
use LinkSifter::store::{LinkStore, PgLinkStore};
use LinkSifter::utils::retry::BackoffPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    info!(
        queue = %args.queue_name,
        batch_size = args.batch_size,
        max_connections = args.max_connections,
        "Persister starting"
    );

    let backend =
        RedisListStore::connect_with_retry(&args.redis_url, &BackoffPolicy::default()).await?;
    let store = Arc::new(QueueStore::new(Box::new(backend)));

    // Connectivity failure here is fatal: no degraded mode.
    let link_store: Arc<dyn LinkStore> =
        Arc::new(PgLinkStore::connect(&args.database_url, args.max_connections).await?);

    let runner = StageRunner::new(
        store.clone(),
        args.queue_name.clone(),
        None,
        RunnerOptions {
            batch_size: args.batch_size,
            wait_time: Duration::from_secs(args.wait_time),
            max_idle_polls: args.max_idle_polls,
        },
    );

    let cancel = CancelFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let trigger = Arc::new(RunnerTrigger::new(
        runner,
        PersistStage::new(link_store.clone()),
        cancel,
    ));

    if args.run_once {
        trigger.run_once().await?;
        return Ok(());
    }

    let state = AppState::new("persister", store, args.queue_name.clone())
        .with_trigger(trigger)
        .with_link_store(link_store);
    server::serve(persister_router(state), args.port).await
}

fn spawn_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the in-flight item");
            cancel.cancel();
        }
    });
}
