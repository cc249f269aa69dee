use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Wire format version for queued items. Bump when the shape of [`LinkItem`]
/// changes incompatibly, so stages deployed at different versions fail loudly
/// instead of silently misreading each other's payloads.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Text surrounding a link on its source page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkContext {
    pub previous_text: Option<String>,
    pub next_text: Option<String>,
    #[serde(default)]
    pub heading_hierarchy: Vec<String>,
}

/// Page-level metadata of the source page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// One scraped link, as carried on the queues between stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkItem {
    /// Target URL of the link.
    pub href: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub rel: Option<String>,
    #[serde(default)]
    pub context: LinkContext,
    #[serde(default)]
    pub metadata: PageMetadata,
    /// The page the link was found on.
    pub source_url: String,
    /// The search term this scrape run is about.
    pub keyword: String,
    /// Concatenation of all textual signals, deduplicated, order-preserving.
    /// Precomputed by the produce stage; the score stage fills it in if absent.
    #[serde(default)]
    pub processed_text: String,
    /// Epoch seconds at scrape time.
    #[serde(default)]
    pub scraped_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_analysis: Option<RelevanceAnalysis>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl Default for LinkItem {
    fn default() -> Self {
        LinkItem {
            href: String::new(),
            text: None,
            title: None,
            aria_label: None,
            rel: None,
            context: LinkContext::default(),
            metadata: PageMetadata::default(),
            source_url: String::new(),
            keyword: String::new(),
            processed_text: String::new(),
            scraped_at: 0,
            relevance_analysis: None,
            schema_version: SCHEMA_VERSION,
        }
    }
}

impl LinkItem {
    /// Boundary validation applied when an item is popped off a queue.
    /// A violation fails this single item, never the batch it arrived in.
    pub fn validate(&self) -> Result<()> {
        if self.href.trim().is_empty() {
            return Err(PipelineError::InvalidItem("href must not be empty".into()));
        }
        if self.source_url.trim().is_empty() {
            return Err(PipelineError::InvalidItem(
                "source_url must not be empty".into(),
            ));
        }
        if self.keyword.trim().is_empty() {
            return Err(PipelineError::InvalidItem(
                "keyword must not be empty".into(),
            ));
        }
        if let Some(analysis) = &self.relevance_analysis {
            if !(0.0..=1.0).contains(&analysis.score) {
                return Err(PipelineError::InvalidItem(format!(
                    "relevance score out of range: {}",
                    analysis.score
                )));
            }
        }
        Ok(())
    }

    /// `(keyword, source_url, href)` — the natural dedup key for persistence.
    /// The same link discovered on the same page for the same keyword is one
    /// logical entity.
    pub fn natural_key(&self) -> (&str, &str, &str) {
        (&self.keyword, &self.source_url, &self.href)
    }
}

/// Scoring result attached to an item by the score stage. Created once and
/// carried through to persistence unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceAnalysis {
    pub keyword: String,
    pub source_url: String,
    pub href_url: String,
    /// Invariant: 0.0 <= score <= 1.0.
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_keywords: Option<BTreeSet<String>>,
}

/// Storage projection of a scored item, keyed by the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub keyword: String,
    pub source_url: String,
    pub href_url: String,
    pub score: f64,
    /// The full item as it left the pipeline, for auditing and reprocessing.
    pub raw_payload: serde_json::Value,
}

impl PersistedRecord {
    /// Projects a queue item into its storage shape. Items that never went
    /// through scoring persist with a zero score rather than being rejected.
    pub fn from_item(item: &LinkItem) -> Result<Self> {
        let score = item
            .relevance_analysis
            .as_ref()
            .map(|a| a.score)
            .unwrap_or(0.0);
        Ok(PersistedRecord {
            keyword: item.keyword.clone(),
            source_url: item.source_url.clone(),
            href_url: item.href.clone(),
            score,
            raw_payload: serde_json::to_value(item)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_fields() {
        let item = LinkItem {
            href: "http://a.test/x".into(),
            source_url: "http://a.test".into(),
            keyword: "".into(),
            ..Default::default()
        };
        assert!(matches!(
            item.validate(),
            Err(PipelineError::InvalidItem(_))
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_score() {
        let item = LinkItem {
            href: "http://a.test/x".into(),
            source_url: "http://a.test".into(),
            keyword: "widget".into(),
            relevance_analysis: Some(RelevanceAnalysis {
                keyword: "widget".into(),
                source_url: "http://a.test".into(),
                href_url: "http://a.test/x".into(),
                score: 1.5,
                explanation: None,
                extracted_keywords: None,
            }),
            ..Default::default()
        };
        assert!(item.validate().is_err());
    }

    #[test]
    fn old_payload_without_schema_version_still_decodes() {
        let raw = r#"{"href":"http://a.test/x","source_url":"http://a.test","keyword":"widget"}"#;
        let item: LinkItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.schema_version, SCHEMA_VERSION);
        assert!(item.validate().is_ok());
    }

    #[test]
    fn record_projection_uses_analysis_score() {
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
            score: 0.75,
            explanation: None,
            extracted_keywords: None,
        });
        let record = PersistedRecord::from_item(&item).unwrap();
        assert_eq!(record.score, 0.75);
        assert_eq!(record.keyword, "widget");
    }
}
