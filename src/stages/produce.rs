use std::sync::Arc;

use tracing::{error, info};

use crate::error::{PipelineError, Result};
use crate::extractor::LinkExtractor;
use crate::queue::{processed_queue_name, QueueStore};
use crate::runner::StageReport;
use crate::utils::metrics::{
    LINKS_PUBLISHED_TOTAL, LINK_PUBLISH_ERRORS_TOTAL, SCRAPE_FAILURES_TOTAL,
    SCRAPE_REQUESTS_TOTAL,
};

/// Produce stage: the head of the pipeline. Runs the extractor for one
/// `(url, keyword)` pair and publishes every record to the scrape queue.
/// Unlike the other stages it has no input queue to drain.
pub struct ProduceStage {
    extractor: Arc<dyn LinkExtractor>,
    store: Arc<QueueStore>,
    queue_name: String,
}

impl ProduceStage {
    pub fn new(
        extractor: Arc<dyn LinkExtractor>,
        store: Arc<QueueStore>,
        queue_name: impl Into<String>,
    ) -> Self {
        ProduceStage {
            extractor,
            store,
            queue_name: queue_name.into(),
        }
    }

    /// Clears both queues of the pair, scrapes the target and publishes the
    /// extracted links. Per-link publish failures are logged and skipped;
    /// a fetch failure fails the whole run.
    pub async fn run(&self, url: &str, keyword: &str) -> Result<StageReport> {
        if url.trim().is_empty() || keyword.trim().is_empty() {
            return Err(PipelineError::InvalidItem(
                "both url and keyword are required".into(),
            ));
        }

        SCRAPE_REQUESTS_TOTAL.inc();
        // Fresh run: stale items from a previous run must not leak in.
        self.store.clear_pair(&self.queue_name).await?;

        let links = match self.extractor.extract(url, keyword).await {
            Ok(links) => links,
            Err(e) => {
                SCRAPE_FAILURES_TOTAL.inc();
                return Err(e);
            }
        };
        info!(count = links.len(), %url, %keyword, "Extracted candidate links");

        let mut published = 0u64;
        for item in &links {
            match self.store.push(&self.queue_name, item).await {
                Ok(()) => {
                    published += 1;
                    LINKS_PUBLISHED_TOTAL.inc();
                }
                Err(e) => {
                    error!(error = %e, href = %item.href, "Failed to publish link, skipping");
                    LINK_PUBLISH_ERRORS_TOTAL.inc();
                }
            }
        }
        info!(published, queue = %self.queue_name, "Published scraped links");

        Ok(StageReport {
            items_processed: published,
            input_queue_length: self.store.len(&self.queue_name).await?,
            processed_queue_length: self
                .store
                .len(&processed_queue_name(&self.queue_name))
                .await?,
            interrupted: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::LinkItem;
    use crate::queue::MemoryListStore;
    use async_trait::async_trait;

    struct FixtureExtractor {
        links: Vec<LinkItem>,
    }

    #[async_trait]
    impl LinkExtractor for FixtureExtractor {
        async fn extract(&self, _url: &str, _keyword: &str) -> Result<Vec<LinkItem>> {
            Ok(self.links.clone())
        }
    }

    fn link(href: &str) -> LinkItem {
        LinkItem {
            href: href.into(),
            source_url: "http://a.test".into(),
            keyword: "widget".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn publishes_extracted_links_after_clearing() {
        let store = Arc::new(QueueStore::new(Box::new(MemoryListStore::new())));
        // A stale item from a previous run.
        store.push("scraped_items", &link("http://stale.test")).await.unwrap();

        let stage = ProduceStage::new(
            Arc::new(FixtureExtractor {
                links: vec![link("http://a.test/1"), link("http://a.test/2")],
            }),
            store.clone(),
            "scraped_items",
        );
        let report = stage.run("http://a.test", "widget").await.unwrap();

        assert_eq!(report.items_processed, 2);
        assert_eq!(report.input_queue_length, 2);
        assert_eq!(report.processed_queue_length, 0);

        let items = store.pop_batch("scraped_items", 10).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.href != "http://stale.test"));
    }

    #[tokio::test]
    async fn rejects_missing_inputs() {
        let store = Arc::new(QueueStore::new(Box::new(MemoryListStore::new())));
        let stage = ProduceStage::new(
            Arc::new(FixtureExtractor { links: vec![] }),
            store,
            "scraped_items",
        );
        let result = stage.run("", "widget").await;
        assert!(matches!(result, Err(PipelineError::InvalidItem(_))));
    }
}
