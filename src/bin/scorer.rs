// src/bin/scorer.rs

//! Score stage binary: drains the scraped-links queue in batches, attaches
//! a relevance analysis to every item and forwards it to the processed
//! queue. Runs either as an HTTP service (`POST /process` triggers a run)
//! or as a one-shot drain with `--run-once`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use LinkSifter::config::load_scoring_config;
use LinkSifter::config::scorer::Args;
use LinkSifter::error::Result;
use LinkSifter::queue::{processed_queue_name, QueueStore, RedisListStore};
use LinkSifter::runner::{CancelFlag, RunnerOptions, RunnerTrigger, StageRunner, StageTrigger};
use LinkSifter::scoring::{HashedBowEmbedder, RelevanceScorer};
use LinkSifter::server::{self, stage_router, AppState};
use LinkSifter::stages::ScoreStage;
use LinkSifter::utils::retry::BackoffPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    info!(
        "Loading scoring configuration from: {}",
        args.scoring_config.display()
    );
    let scoring_config = load_scoring_config(&args.scoring_config)?;
    if args.validate_config {
        info!("Scoring configuration is valid");
        return Ok(());
    }

    info!(
        queue = %args.queue_name,
        batch_size = args.batch_size,
        wait_time = args.wait_time,
        "Scorer starting"
    );

    let backend =
        RedisListStore::connect_with_retry(&args.redis_url, &BackoffPolicy::default()).await?;
    let store = Arc::new(QueueStore::new(Box::new(backend)));

    let embedder = HashedBowEmbedder::new(scoring_config.embedding_dimension);
    let scorer = RelevanceScorer::new(scoring_config.into_policy(), Box::new(embedder));

    let runner = StageRunner::new(
        store.clone(),
        args.queue_name.clone(),
        Some(processed_queue_name(&args.queue_name)),
        RunnerOptions {
            batch_size: args.batch_size,
            wait_time: Duration::from_secs(args.wait_time),
            max_idle_polls: args.max_idle_polls,
        },
    );

    let cancel = CancelFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let trigger = Arc::new(RunnerTrigger::new(runner, ScoreStage::new(scorer), cancel));

    if args.run_once {
        let report = trigger.run_once().await?;
        print_score_summary(&store, &processed_queue_name(&args.queue_name)).await?;
        if report.items_processed > 0 {
            if let Some(next) = &args.next_stage_url {
                server::notify_stage(next).await;
            }
        }
        return Ok(());
    }

    let state = AppState::new("scorer", store, args.queue_name.clone())
        .with_trigger(trigger)
        .with_next_stage(args.next_stage_url.clone());
    server::serve(stage_router(state), args.port).await
}

fn spawn_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the in-flight item");
            cancel.cancel();
        }
    });
}

/// Walk the processed queue non-destructively and log every score plus the
/// run average.
async fn print_score_summary(store: &QueueStore, queue: &str) -> Result<()> {
    let items = store.snapshot(queue).await?;
    info!("Found {} items in queue '{}'", items.len(), queue);

    let mut scores = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if let Some(analysis) = &item.relevance_analysis {
            info!(
                "Item {}/{}: {} score={:.3}",
                index + 1,
                items.len(),
                item.href,
                analysis.score
            );
            scores.push(analysis.score);
        }
    }
    if !scores.is_empty() {
        let average = scores.iter().sum::<f64>() / scores.len() as f64;
        info!("Average score: {:.3}", average);
    }
    Ok(())
}
