mod list_store;
mod memory;
mod redis_store;

pub use list_store::ListStore;
pub use memory::MemoryListStore;
pub use redis_store::RedisListStore;

use serde::Serialize;
use tracing::error;

use crate::data_model::LinkItem;
use crate::error::{PipelineError, Result};
use crate::utils::metrics::ITEM_DECODE_ERRORS_TOTAL;

/// Name of the processed companion of a primary queue.
pub fn processed_queue_name(name: &str) -> String {
    format!("{name}_processed")
}

/// Length snapshot of one queue, for polling-based readiness checks.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub items_ready: bool,
    pub queue_length: u64,
}

/// Durable FIFO queue of serialized [`LinkItem`]s over a [`ListStore`]
/// backend. Stages only observe and mutate queue contents through this
/// type, never by direct indexing.
pub struct QueueStore {
    backend: Box<dyn ListStore>,
}

impl QueueStore {
    pub fn new(backend: Box<dyn ListStore>) -> Self {
        QueueStore { backend }
    }

    /// Serialize `item` and append it at the tail of the logical queue.
    /// Serialization and connectivity errors are returned, never swallowed.
    pub async fn push(&self, queue: &str, item: &LinkItem) -> Result<()> {
        let payload = serde_json::to_string(item)?;
        self.backend.push_head(queue, &payload).await
    }

    /// Remove and return up to `max_count` items from the head, oldest
    /// first. Returns fewer (possibly zero) when the queue is exhausted;
    /// that is not an error. Malformed or invalid payloads are logged with
    /// their raw content and dropped, failing the single item, not the batch.
    pub async fn pop_batch(&self, queue: &str, max_count: usize) -> Result<Vec<LinkItem>> {
        let mut items = Vec::new();
        for _ in 0..max_count {
            let Some(raw) = self.backend.pop_tail(queue).await? else {
                break;
            };
            match decode_item(&raw) {
                Ok(item) => items.push(item),
                Err(e) => {
                    error!(error = %e, raw = %raw, "Dropping undecodable queue item");
                    ITEM_DECODE_ERRORS_TOTAL.inc();
                }
            }
        }
        Ok(items)
    }

    /// Current item count of the named queue.
    pub async fn len(&self, queue: &str) -> Result<u64> {
        self.backend.len(queue).await
    }

    /// Readiness snapshot of the named queue.
    pub async fn status(&self, queue: &str) -> Result<QueueStatus> {
        let queue_length = self.len(queue).await?;
        Ok(QueueStatus {
            items_ready: queue_length > 0,
            queue_length,
        })
    }

    /// Delete both the primary queue and its processed companion. Used at
    /// the start of a fresh run to avoid stale cross-run contamination.
    pub async fn clear_pair(&self, queue: &str) -> Result<()> {
        self.backend.delete(queue).await?;
        self.backend.delete(&processed_queue_name(queue)).await
    }

    /// Pop one item and immediately push it back: "first result" semantics
    /// for synchronous callers, without consuming queue state long-term.
    /// The payload is requeued even when it fails to decode.
    pub async fn peek_and_requeue(&self, queue: &str) -> Result<Option<LinkItem>> {
        let Some(raw) = self.backend.pop_tail(queue).await? else {
            return Ok(None);
        };
        self.backend.push_head(queue, &raw).await?;
        decode_item(&raw).map(Some)
    }

    /// Non-destructive walk of a queue, oldest item first. Undecodable
    /// payloads are logged and skipped.
    pub async fn snapshot(&self, queue: &str) -> Result<Vec<LinkItem>> {
        let mut items: Vec<LinkItem> = Vec::new();
        // range() returns head first; the oldest item lives at the tail.
        for raw in self.backend.range(queue).await?.iter().rev() {
            match decode_item(raw) {
                Ok(item) => items.push(item),
                Err(e) => error!(error = %e, raw = %raw, "Skipping undecodable queue item"),
            }
        }
        Ok(items)
    }

    /// Liveness of the underlying store, surfaced by health endpoints.
    pub async fn ping(&self) -> Result<()> {
        self.backend.ping().await
    }
}

fn decode_item(raw: &str) -> Result<LinkItem> {
    let item: LinkItem = serde_json::from_str(raw).map_err(PipelineError::from)?;
    item.validate()?;
    Ok(item)
}
