use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::data_model::LinkItem;
use crate::error::Result;
use crate::queue::{processed_queue_name, QueueStore};
use crate::utils::metrics::{
    INPUT_QUEUE_DEPTH, STAGE_BATCH_DURATION_SECONDS, STAGE_EMPTY_POLLS_TOTAL,
    STAGE_ITEMS_PROCESSED_TOTAL, STAGE_ITEM_FAILURES_TOTAL,
};

/// One queue-to-queue transformation, applied per item. The runner depends
/// only on this seam, never on concrete scorer or persister types.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, item: LinkItem) -> Result<LinkItem>;
}

/// Cooperative cancellation flag shared between a runner and its binary.
/// Cancelling lets the in-flight item finish, then stops the run.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Items popped per drain cycle.
    pub batch_size: usize,
    /// Sleep between polls while the queue is empty and nothing has been
    /// processed yet.
    pub wait_time: Duration,
    /// Empty polls tolerated before the run completes with "no work found".
    /// Bounds idle loops in automated contexts; exceeding it is not an error.
    pub max_idle_polls: u32,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        RunnerOptions {
            batch_size: 10,
            wait_time: Duration::from_secs(5),
            max_idle_polls: 12,
        }
    }
}

/// Completion summary of one stage run, serialized into trigger responses.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub items_processed: u64,
    pub input_queue_length: u64,
    pub processed_queue_length: u64,
    pub interrupted: bool,
}

/// Drives one queue-to-queue transformation to completion or interruption.
///
/// The run cycles through draining (pop a batch), processing (apply the
/// processor per item, push successes to the output queue) and waiting
/// (sleep while the input is empty and nothing was processed yet). It
/// terminates when the input drains after at least one processed item, when
/// the idle-poll cap is reached, or when cancellation is requested.
///
/// Delivery is at-least-once with per-item failure isolation: an item that
/// fails processing or forwarding is logged and dropped from the pipeline's
/// forward progress, never retried here. Re-running the stage is the
/// caller's retry mechanism.
pub struct StageRunner {
    store: Arc<QueueStore>,
    input_queue: String,
    output_queue: Option<String>,
    options: RunnerOptions,
}

impl StageRunner {
    pub fn new(
        store: Arc<QueueStore>,
        input_queue: impl Into<String>,
        output_queue: Option<String>,
        options: RunnerOptions,
    ) -> Self {
        StageRunner {
            store,
            input_queue: input_queue.into(),
            output_queue,
            options,
        }
    }

    pub async fn run(&self, processor: &dyn ItemProcessor, cancel: &CancelFlag) -> Result<StageReport> {
        let mut items_processed = 0u64;
        let mut idle_polls = 0u32;
        let mut interrupted = false;

        info!(
            stage = processor.name(),
            input_queue = %self.input_queue,
            batch_size = self.options.batch_size,
            "Stage run starting"
        );

        'drain: loop {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let batch = self
                .store
                .pop_batch(&self.input_queue, self.options.batch_size)
                .await?;

            if batch.is_empty() {
                if items_processed > 0 {
                    debug!(stage = processor.name(), "Input queue drained");
                    break;
                }
                idle_polls += 1;
                STAGE_EMPTY_POLLS_TOTAL.inc();
                if idle_polls >= self.options.max_idle_polls {
                    info!(
                        stage = processor.name(),
                        polls = idle_polls,
                        "No work found, completing"
                    );
                    break;
                }
                debug!(
                    stage = processor.name(),
                    wait = ?self.options.wait_time,
                    "Queue empty, waiting"
                );
                tokio::time::sleep(self.options.wait_time).await;
                continue;
            }

            debug!(stage = processor.name(), len = batch.len(), "Processing batch");
            // HistogramTimer observes on drop, covering early exits too.
            let _batch_timer = STAGE_BATCH_DURATION_SECONDS.start_timer();

            for item in batch {
                match processor.process(item).await {
                    Ok(result) => {
                        if let Some(output_queue) = &self.output_queue {
                            if let Err(e) = self.store.push(output_queue, &result).await {
                                error!(
                                    stage = processor.name(),
                                    error = %e,
                                    href = %result.href,
                                    "Failed to forward processed item, dropping"
                                );
                                STAGE_ITEM_FAILURES_TOTAL.inc();
                                continue;
                            }
                        }
                        items_processed += 1;
                        STAGE_ITEMS_PROCESSED_TOTAL.inc();
                    }
                    Err(e) => {
                        error!(
                            stage = processor.name(),
                            error = %e,
                            "Item processing failed, skipping"
                        );
                        STAGE_ITEM_FAILURES_TOTAL.inc();
                    }
                }

                if cancel.is_cancelled() {
                    warn!(
                        stage = processor.name(),
                        "Cancellation requested, skipping rest of batch"
                    );
                    interrupted = true;
                    break 'drain;
                }
            }
        }

        let input_queue_length = self.store.len(&self.input_queue).await?;
        let processed_queue = self
            .output_queue
            .clone()
            .unwrap_or_else(|| processed_queue_name(&self.input_queue));
        let processed_queue_length = self.store.len(&processed_queue).await?;
        INPUT_QUEUE_DEPTH.set(input_queue_length as f64);

        info!(
            stage = processor.name(),
            items_processed,
            input_queue_length,
            processed_queue_length,
            interrupted,
            "Stage run complete"
        );

        Ok(StageReport {
            items_processed,
            input_queue_length,
            processed_queue_length,
            interrupted,
        })
    }
}

/// One-shot "process now" trigger for a stage. Idempotent: triggering with
/// an empty input queue completes with an empty report, not an error.
#[async_trait]
pub trait StageTrigger: Send + Sync {
    async fn run_once(&self) -> Result<StageReport>;
}

/// [`StageTrigger`] over a runner and its processor, as wired by the score
/// and persist binaries.
pub struct RunnerTrigger<P: ItemProcessor> {
    runner: StageRunner,
    processor: P,
    cancel: CancelFlag,
}

impl<P: ItemProcessor> RunnerTrigger<P> {
    pub fn new(runner: StageRunner, processor: P, cancel: CancelFlag) -> Self {
        RunnerTrigger {
            runner,
            processor,
            cancel,
        }
    }
}

#[async_trait]
impl<P: ItemProcessor> StageTrigger for RunnerTrigger<P> {
    async fn run_once(&self) -> Result<StageReport> {
        self.runner.run(&self.processor, &self.cancel).await
    }
}
