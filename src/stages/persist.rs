use std::sync::Arc;

use async_trait::async_trait;

use crate::data_model::{LinkItem, PersistedRecord};
use crate::error::Result;
use crate::runner::ItemProcessor;
use crate::store::LinkStore;
use crate::utils::metrics::{RECORDS_UPSERTED_TOTAL, UPSERT_ERRORS_TOTAL};

/// Persist stage: projects each scored item into a [`PersistedRecord`] and
/// upserts it by natural key. The store is injected at stage startup and
/// shared across the whole run.
pub struct PersistStage {
    store: Arc<dyn LinkStore>,
}

impl PersistStage {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        PersistStage { store }
    }
}

#[async_trait]
impl ItemProcessor for PersistStage {
    fn name(&self) -> &'static str {
        "persist"
    }

    async fn process(&self, item: LinkItem) -> Result<LinkItem> {
        let record = PersistedRecord::from_item(&item)?;
        match self.store.upsert(&record).await {
            Ok(()) => {
                RECORDS_UPSERTED_TOTAL.inc();
                Ok(item)
            }
            Err(e) => {
                UPSERT_ERRORS_TOTAL.inc();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::RelevanceAnalysis;
    use crate::store::MemoryLinkStore;

    fn scored_item(score: f64) -> LinkItem {
        let mut item = LinkItem {
            href: "http://a.test/x".into(),
            source_url: "http://a.test".into(),
            keyword: "widget".into(),
            ..Default::default()
        };
        item.relevance_analysis = Some(RelevanceAnalysis {
            keyword: "widget".into(),
            source_url: "http://a.test".into(),
            href_url: "http://a.test/x".into(),
            score,
            explanation: None,
            extracted_keywords: None,
        });
        item
    }

    #[tokio::test]
    async fn persists_scored_item() {
        let store = Arc::new(MemoryLinkStore::new());
        let stage = PersistStage::new(store.clone());

        stage.process(scored_item(0.8)).await.unwrap();

        let stored = store.find_by_href("http://a.test/x").await.unwrap().unwrap();
        assert_eq!(stored.score, 0.8);
        assert_eq!(stored.keyword, "widget");
    }

    #[tokio::test]
    async fn unscored_item_persists_with_zero_score() {
        let store = Arc::new(MemoryLinkStore::new());
        let stage = PersistStage::new(store.clone());

        let item = LinkItem {
            href: "http://a.test/y".into(),
            source_url: "http://a.test".into(),
            keyword: "widget".into(),
            ..Default::default()
        };
        stage.process(item).await.unwrap();

        let stored = store.find_by_href("http://a.test/y").await.unwrap().unwrap();
        assert_eq!(stored.score, 0.0);
    }
}
