// src/bin/producer.rs

//! # Producer Binary
//!
//! This binary is the head of the LinkSifter pipeline. Its main roles are:
//!
//! 1.  **Scraping**: Given a target URL and a keyword, it fetches the page
//!     (with bounded retries and a polite delay) and extracts every link
//!     together with its surrounding context and page metadata.
//!
//! 2.  **Publishing**: Each extracted link is serialized and published to
//!     the scrape queue, after clearing both queues of the pair so a fresh
//!     run never mixes with stale items from a previous one.
//!
//! 3.  **Triggering**: After a successful run, the score stage can be
//!     notified through a one-shot HTTP call so the pipeline advances
//!     without a standing subscription.
//!
//! The binary runs in one of two modes: a one-shot CLI run when `--url`
//! and `--keyword` are given, or an HTTP service exposing `POST /scrape`
//! plus the usual health, queue-status and metrics endpoints.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use indicatif::{HumanDuration, ProgressBar};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use LinkSifter::config::producer::Args;
use LinkSifter::error::{PipelineError, Result};
use LinkSifter::extractor::HttpLinkExtractor;
use LinkSifter::queue::{QueueStore, RedisListStore};
use LinkSifter::server::{self, producer_router, AppState};
use LinkSifter::stages::ProduceStage;
use LinkSifter::utils::retry::BackoffPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    info!(
        queue = %args.queue_name,
        "Producer starting"
    );

    let backend =
        RedisListStore::connect_with_retry(&args.redis_url, &BackoffPolicy::default()).await?;
    let store = Arc::new(QueueStore::new(Box::new(backend)));

    let fetch_backoff = BackoffPolicy {
        max_attempts: args.retry_count,
        ..Default::default()
    };
    let extractor = Arc::new(HttpLinkExtractor::new(fetch_backoff)?);
    let produce = Arc::new(ProduceStage::new(
        extractor,
        store.clone(),
        args.queue_name.clone(),
    ));

    match (&args.url, &args.keyword) {
        (Some(url), Some(keyword)) => run_one_shot(&args, produce, store, url, keyword).await,
        (None, None) => {
            let state = AppState::new("producer", store, args.queue_name.clone())
                .with_produce(produce)
                .with_next_stage(args.next_stage_url.clone());
            server::serve(producer_router(state), args.port).await
        }
        _ => Err(PipelineError::ConfigError(
            "--url and --keyword must be provided together".to_string(),
        )),
    }
}

/// One-shot CLI mode: scrape, publish, print a short queue summary, and
/// optionally kick the score stage.
async fn run_one_shot(
    args: &Args,
    produce: Arc<ProduceStage>,
    store: Arc<QueueStore>,
    url: &str,
    keyword: &str,
) -> Result<()> {
    info!(%url, %keyword, "Starting one-shot scrape run");
    let started = Instant::now();

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Scraping {url}"));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let report = produce.run(url, keyword).await?;

    spinner.finish_with_message(format!(
        "Published {} links in {}",
        report.items_processed,
        HumanDuration(started.elapsed())
    ));

    let queued = store.len(&args.queue_name).await?;
    info!(
        queue = %args.queue_name,
        queued,
        "Scrape run complete, items waiting for the score stage"
    );

    if report.items_processed > 0 {
        if let Some(next) = &args.next_stage_url {
            server::notify_stage(next).await;
        }
    }
    Ok(())
}
