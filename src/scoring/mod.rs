mod embedder;

pub use embedder::{cosine_similarity, HashedBowEmbedder, TextEmbedder, DEFAULT_EMBEDDING_DIMENSION};

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::utils::text::keyword_windows;

/// Relative trust placed in each scoring signal. The weights are policy,
/// not contract: they come from configuration and only the ordering
/// (exact >= semantic >= context, sum <= 1) is enforced.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct SignalWeights {
    pub exact: f64,
    pub semantic: f64,
    pub context: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        SignalWeights {
            exact: 0.5,
            semantic: 0.3,
            context: 0.2,
        }
    }
}

/// Tunable knobs of the relevance model.
#[derive(Debug, Clone)]
pub struct ScoringPolicy {
    pub weights: SignalWeights,
    /// Steepness of the logistic squashing applied to raw cosine values.
    /// Steeper polarizes borderline similarities; gentler preserves nuance.
    pub similarity_steepness: f64,
    /// Steepness of the second squashing pass, centred at 0.5, that sharpens
    /// the relevant / not-relevant boundary while preserving ordering.
    pub decision_steepness: f64,
    /// Words taken on either side of a keyword occurrence for the
    /// local-context signal.
    pub context_window: usize,
    /// Scores below this are floored to 0.0 (None disables flooring).
    pub low_clip: Option<f64>,
    /// Scores above this are ceiled to 1.0 (None disables ceiling).
    pub high_clip: Option<f64>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        ScoringPolicy {
            weights: SignalWeights::default(),
            similarity_steepness: 4.0,
            decision_steepness: 8.0,
            context_window: 3,
            low_clip: Some(0.2),
            high_clip: Some(0.9),
        }
    }
}

/// Result of scoring one text against one keyword.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    /// Always within [0.0, 1.0].
    pub score: f64,
    pub explanation: String,
    /// Words of the best-matching context window, when one exists.
    pub extracted_keywords: BTreeSet<String>,
}

/// Combines an exact-match signal, a semantic similarity signal and a
/// local-context signal into one bounded relevance score. Pure: the same
/// inputs always produce the same outcome.
pub struct RelevanceScorer {
    policy: ScoringPolicy,
    embedder: Box<dyn TextEmbedder>,
}

impl RelevanceScorer {
    pub fn new(policy: ScoringPolicy, embedder: Box<dyn TextEmbedder>) -> Self {
        RelevanceScorer { policy, embedder }
    }

    /// Scorer with the default hashed bag-of-words backend.
    pub fn with_default_backend(policy: ScoringPolicy) -> Self {
        Self::new(policy, Box::new(HashedBowEmbedder::default()))
    }

    pub fn score(&self, text: &str, keyword: &str) -> ScoreOutcome {
        let text = text.trim();
        let keyword = keyword.trim();
        if text.is_empty() || keyword.is_empty() {
            return ScoreOutcome {
                score: 0.0,
                explanation: "no input: empty text or keyword".to_string(),
                extracted_keywords: BTreeSet::new(),
            };
        }

        let exact = if text.to_lowercase().contains(&keyword.to_lowercase()) {
            1.0
        } else {
            0.0
        };

        let keyword_vector = self.embedder.embed(keyword);
        let semantic = self.squash_similarity(cosine_similarity(
            &self.embedder.embed(text),
            &keyword_vector,
        ));

        let (context, best_window) = if exact > 0.0 {
            self.best_window_similarity(text, keyword, &keyword_vector)
        } else {
            (0.0, None)
        };

        let w = &self.policy.weights;
        let combined = w.exact * exact + w.semantic * semantic + w.context * context;
        let sharpened = logistic(self.policy.decision_steepness * (combined - 0.5));
        let score = self.clip(sharpened).clamp(0.0, 1.0);

        let explanation = format!(
            "exact={exact:.1} semantic={semantic:.3} context={context:.3} combined={combined:.3} final={score:.3}"
        );
        let extracted_keywords = best_window
            .map(|window| {
                window
                    .split_whitespace()
                    .map(|word| word.to_lowercase())
                    .collect()
            })
            .unwrap_or_default();

        ScoreOutcome {
            score,
            explanation,
            extracted_keywords,
        }
    }

    /// Squash a raw cosine similarity in [-1, 1] into [0, 1] monotonically.
    fn squash_similarity(&self, cosine: f32) -> f64 {
        logistic(self.policy.similarity_steepness * cosine as f64)
    }

    /// The most relevant fixed-size word window around any occurrence of the
    /// keyword, scored like the full-text signal.
    fn best_window_similarity(
        &self,
        text: &str,
        keyword: &str,
        keyword_vector: &[f32],
    ) -> (f64, Option<String>) {
        let mut best = (0.0f64, None);
        for window in keyword_windows(text, keyword, self.policy.context_window) {
            let similarity = self.squash_similarity(cosine_similarity(
                &self.embedder.embed(&window),
                keyword_vector,
            ));
            if similarity > best.0 {
                best = (similarity, Some(window));
            }
        }
        best
    }

    fn clip(&self, score: f64) -> f64 {
        if let Some(low) = self.policy.low_clip {
            if score < low {
                return 0.0;
            }
        }
        if let Some(high) = self.policy.high_clip {
            if score > high {
                return 1.0;
            }
        }
        score
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> RelevanceScorer {
        RelevanceScorer::with_default_backend(ScoringPolicy::default())
    }

    #[test]
    fn empty_input_scores_zero_with_explanation() {
        let outcome = scorer().score("", "widget");
        assert_eq!(outcome.score, 0.0);
        assert!(outcome.explanation.contains("no input"));

        let outcome = scorer().score("some text", "   ");
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn logistic_is_monotonic_and_bounded() {
        let mut previous = 0.0;
        for i in -50..=50 {
            let value = logistic(i as f64 / 5.0);
            assert!(value > 0.0 && value < 1.0);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn exact_match_dominates() {
        let s = scorer();
        let with_match = s.score("order a premium widget today", "widget");
        let without = s.score("order a premium gadget today", "widget");
        assert!(with_match.score >= without.score);
        assert!(with_match.score > 0.5);
    }

    #[test]
    fn unclipped_scores_stay_in_bounds() {
        let policy = ScoringPolicy {
            low_clip: None,
            high_clip: None,
            ..Default::default()
        };
        let s = RelevanceScorer::with_default_backend(policy);
        for (text, keyword) in [
            ("widget", "widget"),
            ("nothing in common at all", "widget"),
            ("ウィジェット を 買う", "ウィジェット"),
            ("a", "b"),
        ] {
            let outcome = s.score(text, keyword);
            assert!(
                (0.0..=1.0).contains(&outcome.score),
                "{text} / {keyword} -> {}",
                outcome.score
            );
        }
    }

    #[test]
    fn context_window_words_are_extracted_on_match() {
        let outcome = scorer().score("the premium widget catalog is here", "widget");
        assert!(outcome.extracted_keywords.contains("widget"));
        assert!(outcome.extracted_keywords.contains("premium"));
    }

    #[test]
    fn case_insensitive_exact_match() {
        let s = scorer();
        let upper = s.score("Premium WIDGET sale", "widget");
        let lower = s.score("premium widget sale", "widget");
        assert!(upper.score > 0.5);
        assert!(lower.score > 0.5);
    }
}
