// src/utils/metrics.rs

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram,
};

// Metrics from the produce stage
pub static LINKS_PUBLISHED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "producer_links_published_total",
        "Total number of scraped links published to the queue."
    )
    .expect("Failed to register LINKS_PUBLISHED_TOTAL counter")
});

pub static LINK_PUBLISH_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "producer_link_publish_errors_total",
        "Total number of errors publishing scraped links (serialization, queue)."
    )
    .expect("Failed to register LINK_PUBLISH_ERRORS_TOTAL counter")
});

pub static SCRAPE_REQUESTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "producer_scrape_requests_total",
        "Total number of scrape runs started."
    )
    .expect("Failed to register SCRAPE_REQUESTS_TOTAL counter")
});

pub static SCRAPE_FAILURES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "producer_scrape_failures_total",
        "Total number of scrape runs that failed to fetch or parse the target."
    )
    .expect("Failed to register SCRAPE_FAILURES_TOTAL counter")
});

// Metrics shared by the queue-draining stages (score, persist)
pub static STAGE_ITEMS_PROCESSED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "stage_items_processed_total",
        "Total number of items processed and forwarded by this stage."
    )
    .expect("Failed to register STAGE_ITEMS_PROCESSED_TOTAL counter")
});

pub static STAGE_ITEM_FAILURES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "stage_item_failures_total",
        "Total number of items dropped because processing or forwarding failed."
    )
    .expect("Failed to register STAGE_ITEM_FAILURES_TOTAL counter")
});

pub static STAGE_EMPTY_POLLS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "stage_empty_polls_total",
        "Total number of polls that found the input queue empty."
    )
    .expect("Failed to register STAGE_EMPTY_POLLS_TOTAL counter")
});

pub static STAGE_BATCH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "stage_batch_duration_seconds",
        "Histogram of per-batch processing durations."
    )
    .expect("Failed to register STAGE_BATCH_DURATION_SECONDS histogram")
});

pub static INPUT_QUEUE_DEPTH: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "stage_input_queue_depth",
        "Input queue length observed at the end of the last stage run."
    )
    .expect("Failed to register INPUT_QUEUE_DEPTH gauge")
});

pub static ITEM_DECODE_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "queue_item_decode_errors_total",
        "Total number of queue payloads dropped as malformed or invalid."
    )
    .expect("Failed to register ITEM_DECODE_ERRORS_TOTAL counter")
});

// Metrics from the score stage
pub static RELEVANCE_SCORES: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "scorer_relevance_scores",
        "Distribution of relevance scores assigned to links.",
        vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0]
    )
    .expect("Failed to register RELEVANCE_SCORES histogram")
});

// Metrics from the persist stage
pub static RECORDS_UPSERTED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "persister_records_upserted_total",
        "Total number of records written to storage (inserts and replacements)."
    )
    .expect("Failed to register RECORDS_UPSERTED_TOTAL counter")
});

pub static UPSERT_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "persister_upsert_errors_total",
        "Total number of failed storage writes."
    )
    .expect("Failed to register UPSERT_ERRORS_TOTAL counter")
});
