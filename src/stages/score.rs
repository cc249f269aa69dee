use async_trait::async_trait;

use crate::data_model::{LinkItem, RelevanceAnalysis};
use crate::error::Result;
use crate::runner::ItemProcessor;
use crate::scoring::RelevanceScorer;
use crate::utils::metrics::RELEVANCE_SCORES;
use crate::utils::text::aggregate_text;

/// Score stage: attaches a [`RelevanceAnalysis`] to every item. Scoring is
/// pure and total, so this processor never fails an item; an item with no
/// usable text simply scores 0.0 with an explanation.
pub struct ScoreStage {
    scorer: RelevanceScorer,
}

impl ScoreStage {
    pub fn new(scorer: RelevanceScorer) -> Self {
        ScoreStage { scorer }
    }
}

#[async_trait]
impl ItemProcessor for ScoreStage {
    fn name(&self) -> &'static str {
        "score"
    }

    async fn process(&self, mut item: LinkItem) -> Result<LinkItem> {
        if item.processed_text.is_empty() {
            item.processed_text = aggregate_text(&item);
        }

        let outcome = self.scorer.score(&item.processed_text, &item.keyword);
        RELEVANCE_SCORES.observe(outcome.score);

        item.relevance_analysis = Some(RelevanceAnalysis {
            keyword: item.keyword.clone(),
            source_url: item.source_url.clone(),
            href_url: item.href.clone(),
            score: outcome.score,
            explanation: Some(outcome.explanation),
            extracted_keywords: if outcome.extracted_keywords.is_empty() {
                None
            } else {
                Some(outcome.extracted_keywords)
            },
        });
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringPolicy;

    fn stage() -> ScoreStage {
        ScoreStage::new(RelevanceScorer::with_default_backend(ScoringPolicy::default()))
    }

    #[tokio::test]
    async fn attaches_analysis_with_natural_key_fields() {
        let item = LinkItem {
            href: "http://a.test/x".into(),
            text: Some("alpha widget".into()),
            source_url: "http://a.test".into(),
            keyword: "widget".into(),
            ..Default::default()
        };
        let scored = stage().process(item).await.unwrap();
        let analysis = scored.relevance_analysis.expect("analysis attached");
        assert_eq!(analysis.keyword, "widget");
        assert_eq!(analysis.href_url, "http://a.test/x");
        assert!((0.0..=1.0).contains(&analysis.score));
        assert!(analysis.explanation.is_some());
    }

    #[tokio::test]
    async fn fills_processed_text_when_absent() {
        let item = LinkItem {
            href: "http://a.test/x".into(),
            text: Some("alpha widget".into()),
            source_url: "http://a.test".into(),
            keyword: "widget".into(),
            ..Default::default()
        };
        let scored = stage().process(item).await.unwrap();
        assert_eq!(scored.processed_text, "alpha widget");
    }

    #[tokio::test]
    async fn item_without_text_scores_zero() {
        let item = LinkItem {
            href: "http://a.test/x".into(),
            source_url: "http://a.test".into(),
            keyword: "widget".into(),
            ..Default::default()
        };
        let scored = stage().process(item).await.unwrap();
        assert_eq!(scored.relevance_analysis.unwrap().score, 0.0);
    }
}
