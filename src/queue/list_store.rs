use async_trait::async_trait;

use crate::error::Result;

/// Minimal list-store surface the queue needs from its backend: push at the
/// head, pop at the tail, so insertion order is consumption order. Backends
/// must make pop atomic so concurrent stage instances never receive the same
/// payload twice.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Append `payload` at the head of the named list.
    async fn push_head(&self, list: &str, payload: &str) -> Result<()>;

    /// Remove and return the payload at the tail of the named list, or
    /// `None` when the list is empty or absent.
    async fn pop_tail(&self, list: &str) -> Result<Option<String>>;

    /// Current number of payloads in the named list (0 when absent).
    async fn len(&self, list: &str) -> Result<u64>;

    /// Non-destructive read of the whole list, head first.
    async fn range(&self, list: &str) -> Result<Vec<String>>;

    /// Drop the named list entirely.
    async fn delete(&self, list: &str) -> Result<()>;

    /// Cheap liveness probe, used by health endpoints.
    async fn ping(&self) -> Result<()>;
}
