// tests/runner_tests.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use LinkSifter::data_model::LinkItem;
use LinkSifter::error::{PipelineError, Result};
use LinkSifter::queue::{MemoryListStore, QueueStore};
use LinkSifter::runner::{
    CancelFlag, ItemProcessor, RunnerOptions, RunnerTrigger, StageRunner, StageTrigger,
};

struct IdentityProcessor;

#[async_trait]
impl ItemProcessor for IdentityProcessor {
    fn name(&self) -> &'static str {
        "IdentityProcessor"
    }

    async fn process(&self, item: LinkItem) -> Result<LinkItem> {
        Ok(item)
    }
}

/// Fails every item whose href matches, to exercise per-item isolation.
struct FailingProcessor {
    fail_href: String,
}

#[async_trait]
impl ItemProcessor for FailingProcessor {
    fn name(&self) -> &'static str {
        "FailingProcessor"
    }

    async fn process(&self, item: LinkItem) -> Result<LinkItem> {
        if item.href == self.fail_href {
            Err(PipelineError::Unexpected("induced failure".into()))
        } else {
            Ok(item)
        }
    }
}

/// Requests cancellation while its first item is in flight.
struct CancellingProcessor {
    cancel: CancelFlag,
}

#[async_trait]
impl ItemProcessor for CancellingProcessor {
    fn name(&self) -> &'static str {
        "CancellingProcessor"
    }

    async fn process(&self, item: LinkItem) -> Result<LinkItem> {
        self.cancel.cancel();
        Ok(item)
    }
}

fn item(href: &str) -> LinkItem {
    LinkItem {
        href: href.into(),
        source_url: "http://source.test".into(),
        keyword: "widget".into(),
        ..Default::default()
    }
}

fn quick_options(batch_size: usize) -> RunnerOptions {
    RunnerOptions {
        batch_size,
        wait_time: Duration::from_millis(10),
        max_idle_polls: 2,
    }
}

async fn seed(store: &QueueStore, queue: &str, count: usize) {
    for i in 0..count {
        store
            .push(queue, &item(&format!("http://a.test/{i}")))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn drain_terminates_after_processing_all_items() {
    let store = Arc::new(QueueStore::new(Box::new(MemoryListStore::new())));
    seed(&store, "in", 25).await;

    let runner = StageRunner::new(store.clone(), "in", Some("out".into()), quick_options(10));
    let report = runner.run(&IdentityProcessor, &CancelFlag::new()).await.unwrap();

    assert_eq!(report.items_processed, 25);
    assert_eq!(report.input_queue_length, 0);
    assert_eq!(report.processed_queue_length, 25);
    assert!(!report.interrupted);
}

#[tokio::test]
async fn empty_queue_completes_after_idle_cap() {
    let store = Arc::new(QueueStore::new(Box::new(MemoryListStore::new())));

    let runner = StageRunner::new(store.clone(), "in", Some("out".into()), quick_options(10));
    let report = runner.run(&IdentityProcessor, &CancelFlag::new()).await.unwrap();

    // "No work found" is a successful completion, not an error.
    assert_eq!(report.items_processed, 0);
    assert!(!report.interrupted);
}

#[tokio::test]
async fn per_item_failure_does_not_halt_the_batch() {
    let store = Arc::new(QueueStore::new(Box::new(MemoryListStore::new())));
    seed(&store, "in", 3).await;

    let processor = FailingProcessor {
        fail_href: "http://a.test/1".into(),
    };
    let runner = StageRunner::new(store.clone(), "in", Some("out".into()), quick_options(10));
    let report = runner.run(&processor, &CancelFlag::new()).await.unwrap();

    assert_eq!(report.items_processed, 2);
    assert_eq!(report.input_queue_length, 0);

    let forwarded = store.pop_batch("out", 10).await.unwrap();
    assert_eq!(forwarded.len(), 2);
    assert!(forwarded.iter().all(|i| i.href != "http://a.test/1"));
}

#[tokio::test]
async fn fifo_order_survives_the_stage_hop() {
    let store = Arc::new(QueueStore::new(Box::new(MemoryListStore::new())));
    seed(&store, "in", 5).await;

    let runner = StageRunner::new(store.clone(), "in", Some("out".into()), quick_options(2));
    runner.run(&IdentityProcessor, &CancelFlag::new()).await.unwrap();

    let forwarded = store.pop_batch("out", 10).await.unwrap();
    let hrefs: Vec<&str> = forwarded.iter().map(|i| i.href.as_str()).collect();
    assert_eq!(
        hrefs,
        vec![
            "http://a.test/0",
            "http://a.test/1",
            "http://a.test/2",
            "http://a.test/3",
            "http://a.test/4"
        ]
    );
}

#[tokio::test]
async fn cancellation_finishes_in_flight_item_and_stops() {
    let store = Arc::new(QueueStore::new(Box::new(MemoryListStore::new())));
    seed(&store, "in", 4).await;

    let cancel = CancelFlag::new();
    let processor = CancellingProcessor {
        cancel: cancel.clone(),
    };
    let runner = StageRunner::new(store.clone(), "in", Some("out".into()), quick_options(2));
    let report = runner.run(&processor, &cancel).await.unwrap();

    // The in-flight item completed, the rest of the batch was skipped and
    // the second batch never popped.
    assert!(report.interrupted);
    assert_eq!(report.items_processed, 1);
    assert_eq!(report.input_queue_length, 2);
    assert_eq!(store.len("out").await.unwrap(), 1);
}

#[tokio::test]
async fn already_cancelled_runner_processes_nothing() {
    let store = Arc::new(QueueStore::new(Box::new(MemoryListStore::new())));
    seed(&store, "in", 3).await;

    let cancel = CancelFlag::new();
    cancel.cancel();

    let runner = StageRunner::new(store.clone(), "in", Some("out".into()), quick_options(10));
    let report = runner.run(&IdentityProcessor, &cancel).await.unwrap();

    assert!(report.interrupted);
    assert_eq!(report.items_processed, 0);
    assert_eq!(report.input_queue_length, 3);
}

#[tokio::test]
async fn trigger_on_empty_queue_is_an_idempotent_noop() {
    let store = Arc::new(QueueStore::new(Box::new(MemoryListStore::new())));
    seed(&store, "in", 2).await;

    let runner = StageRunner::new(store.clone(), "in", Some("out".into()), quick_options(10));
    let trigger = RunnerTrigger::new(runner, IdentityProcessor, CancelFlag::new());

    let first = trigger.run_once().await.unwrap();
    assert_eq!(first.items_processed, 2);

    // Triggering again with nothing queued completes with an empty report.
    let second = trigger.run_once().await.unwrap();
    assert_eq!(second.items_processed, 0);
    assert_eq!(second.processed_queue_length, 2);
}
