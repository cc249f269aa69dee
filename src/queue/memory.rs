use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{PipelineError, Result};
use crate::queue::ListStore;

/// In-process list store. Backs unit and integration tests, and embedded
/// single-process runs where durability is not needed. Clones share the
/// underlying lists.
#[derive(Clone, Default)]
pub struct MemoryListStore {
    lists: Arc<Mutex<HashMap<String, VecDeque<String>>>>,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, VecDeque<String>>>> {
        self.lists
            .lock()
            .map_err(|_| PipelineError::QueueError("memory store mutex poisoned".into()))
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn push_head(&self, list: &str, payload: &str) -> Result<()> {
        self.lock()?
            .entry(list.to_string())
            .or_default()
            .push_front(payload.to_string());
        Ok(())
    }

    async fn pop_tail(&self, list: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get_mut(list).and_then(VecDeque::pop_back))
    }

    async fn len(&self, list: &str) -> Result<u64> {
        Ok(self.lock()?.get(list).map_or(0, |l| l.len() as u64))
    }

    async fn range(&self, list: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .get(list)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, list: &str) -> Result<()> {
        self.lock()?.remove(list);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
