use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::scoring::{ScoringPolicy, SignalWeights, DEFAULT_EMBEDDING_DIMENSION};

fn default_similarity_steepness() -> f64 {
    4.0
}

fn default_decision_steepness() -> f64 {
    8.0
}

fn default_context_window() -> usize {
    3
}

fn default_low_clip() -> Option<f64> {
    Some(0.2)
}

fn default_high_clip() -> Option<f64> {
    Some(0.9)
}

fn default_embedding_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

/// Scoring policy as read from YAML. The weights are deliberately
/// configuration, not constants: different deployments tune them without a
/// rebuild.
#[derive(Deserialize, Debug, Clone)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: SignalWeights,
    #[serde(default = "default_similarity_steepness")]
    pub similarity_steepness: f64,
    #[serde(default = "default_decision_steepness")]
    pub decision_steepness: f64,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default = "default_low_clip")]
    pub low_clip: Option<f64>,
    #[serde(default = "default_high_clip")]
    pub high_clip: Option<f64>,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            weights: SignalWeights::default(),
            similarity_steepness: default_similarity_steepness(),
            decision_steepness: default_decision_steepness(),
            context_window: default_context_window(),
            low_clip: default_low_clip(),
            high_clip: default_high_clip(),
            embedding_dimension: default_embedding_dimension(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        for (name, value) in [
            ("exact", w.exact),
            ("semantic", w.semantic),
            ("context", w.context),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::ConfigValidationError(format!(
                    "ScoringConfig: weight '{}' must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }
        if w.exact + w.semantic + w.context > 1.0 + f64::EPSILON {
            return Err(PipelineError::ConfigValidationError(format!(
                "ScoringConfig: weights must sum to at most 1.0, got {}",
                w.exact + w.semantic + w.context
            )));
        }
        if !(w.exact >= w.semantic && w.semantic >= w.context) {
            return Err(PipelineError::ConfigValidationError(
                "ScoringConfig: weights must satisfy exact >= semantic >= context".to_string(),
            ));
        }
        if self.similarity_steepness <= 0.0 || self.decision_steepness <= 0.0 {
            return Err(PipelineError::ConfigValidationError(
                "ScoringConfig: steepness values must be greater than 0.0".to_string(),
            ));
        }
        if self.context_window == 0 {
            return Err(PipelineError::ConfigValidationError(
                "ScoringConfig: context_window must be greater than 0".to_string(),
            ));
        }
        for (name, clip) in [("low_clip", self.low_clip), ("high_clip", self.high_clip)] {
            if let Some(value) = clip {
                if !(0.0..=1.0).contains(&value) {
                    return Err(PipelineError::ConfigValidationError(format!(
                        "ScoringConfig: {} must be between 0.0 and 1.0, got {}",
                        name, value
                    )));
                }
            }
        }
        if let (Some(low), Some(high)) = (self.low_clip, self.high_clip) {
            if low >= high {
                return Err(PipelineError::ConfigValidationError(format!(
                    "ScoringConfig: low_clip ({}) must be below high_clip ({})",
                    low, high
                )));
            }
        }
        if self.embedding_dimension == 0 {
            return Err(PipelineError::ConfigValidationError(
                "ScoringConfig: embedding_dimension must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn into_policy(self) -> ScoringPolicy {
        ScoringPolicy {
            weights: self.weights,
            similarity_steepness: self.similarity_steepness,
            decision_steepness: self.decision_steepness,
            context_window: self.context_window,
            low_clip: self.low_clip,
            high_clip: self.high_clip,
        }
    }
}

/// Loads and parses the scoring configuration YAML file.
pub fn load_scoring_config<P: AsRef<Path>>(config_path: P) -> Result<ScoringConfig> {
    let path_ref = config_path.as_ref();
    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        PipelineError::ConfigError(format!(
            "Failed to read scoring config file '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    let config: ScoringConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        PipelineError::ConfigError(format!(
            "Failed to parse scoring config YAML from '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "{}", content).expect("Failed to write to temp file");
        temp_file
    }

    #[test]
    fn test_load_valid_config() {
        let yaml_content = r#"
weights:
  exact: 0.6
  semantic: 0.3
  context: 0.1
similarity_steepness: 5.0
context_window: 4
        "#;
        let temp_file = create_temp_config_file(yaml_content);
        let config = load_scoring_config(temp_file.path()).expect("valid config should load");
        assert_eq!(config.weights.exact, 0.6);
        assert_eq!(config.similarity_steepness, 5.0);
        assert_eq!(config.context_window, 4);
        // Unspecified knobs keep their defaults.
        assert_eq!(config.decision_steepness, 8.0);
        assert_eq!(config.low_clip, Some(0.2));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_scoring_config("non_existent_config.yaml");
        match result.err().unwrap() {
            PipelineError::ConfigError(msg) => {
                assert!(msg.contains("Failed to read scoring config file"));
            }
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_load_invalid_yaml_syntax() {
        let yaml_content = "weights: [not, a, mapping";
        let temp_file = create_temp_config_file(yaml_content);
        let result = load_scoring_config(temp_file.path());
        match result.err().unwrap() {
            PipelineError::ConfigError(msg) => {
                assert!(msg.contains("Failed to parse scoring config YAML"));
            }
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let temp_file = create_temp_config_file("{}");
        let config = load_scoring_config(temp_file.path()).expect("defaults should validate");
        assert_eq!(config.weights, SignalWeights::default());
        assert_eq!(config.embedding_dimension, DEFAULT_EMBEDDING_DIMENSION);
    }

    #[test]
    fn test_weights_must_sum_to_at_most_one() {
        let config = ScoringConfig {
            weights: SignalWeights {
                exact: 0.6,
                semantic: 0.4,
                context: 0.2,
            },
            ..Default::default()
        };
        match config.validate().err().unwrap() {
            PipelineError::ConfigValidationError(msg) => {
                assert!(msg.contains("sum to at most 1.0"));
            }
            other => panic!("Expected ConfigValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_weight_ordering_is_enforced() {
        let config = ScoringConfig {
            weights: SignalWeights {
                exact: 0.2,
                semantic: 0.5,
                context: 0.1,
            },
            ..Default::default()
        };
        match config.validate().err().unwrap() {
            PipelineError::ConfigValidationError(msg) => {
                assert!(msg.contains("exact >= semantic >= context"));
            }
            other => panic!("Expected ConfigValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_clip_ordering_is_enforced() {
        let config = ScoringConfig {
            low_clip: Some(0.9),
            high_clip: Some(0.2),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_context_window_is_rejected() {
        let config = ScoringConfig {
            context_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
