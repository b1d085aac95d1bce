//! Unsupervised scorer
//!
//! Thin wrapper turning raw isolation-forest output into a typed result:
//! the contamination-derived flag, the score rescaled into [1, 100] by the
//! normalizer fit at training time, and the top contributing feature names
//! for downstream attribution.

use crate::error::EngineError;
use crate::explain::ReasonAttributor;
use crate::features::{FeatureVector, FEATURE_COLUMNS};
use crate::models::artifacts::ModelArtifacts;

/// Number of contributing features exposed per flagged record.
const TOP_FEATURES: usize = 3;

/// Typed result of one unsupervised evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsupervisedScore {
    pub is_anomaly: bool,
    /// Normalized score in [1, 100]; unit-consistent across model versions.
    pub score: f64,
    /// Most contributing feature names, largest deviation first. Empty when
    /// the record was not flagged.
    pub top_features: Vec<&'static str>,
}

/// Scores feature vectors against the frozen isolation forest.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupervisedScorer {
    attributor: ReasonAttributor,
}

impl UnsupervisedScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score one feature vector. Deterministic: the same frozen artifacts
    /// and identical features reproduce the output bit-for-bit.
    pub fn score(
        &self,
        features: &FeatureVector,
        artifacts: &ModelArtifacts,
    ) -> Result<UnsupervisedScore, EngineError> {
        if features.len() != FEATURE_COLUMNS.len() {
            return Err(EngineError::FeatureDimensionMismatch {
                expected: FEATURE_COLUMNS.len(),
                got: features.len(),
            });
        }

        let scaled = artifacts.scaler.transform(features.values());
        let raw = artifacts.isolation_forest.anomaly_score(&scaled);
        let is_anomaly = raw > artifacts.isolation_forest.threshold();
        let score = artifacts.score_normalizer.transform(raw);

        let top_features = if is_anomaly {
            self.attributor
                .top_features(features, &artifacts.statistics, TOP_FEATURES)
        } else {
            Vec::new()
        };

        Ok(UnsupervisedScore {
            is_anomaly,
            score,
            top_features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;
    use crate::testutil::{fixture_corpus, trained_artifacts};

    #[test]
    fn test_score_stays_in_range() {
        let artifacts = trained_artifacts();
        let extractor = FeatureExtractor::new();
        for record in fixture_corpus(60) {
            let features = extractor.extract(&record, &artifacts.encoder);
            if features.first_non_finite().is_some() {
                continue;
            }
            let result = UnsupervisedScorer::new().score(&features, &artifacts).unwrap();
            assert!((1.0..=100.0).contains(&result.score), "score {}", result.score);
        }
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let artifacts = trained_artifacts();
        let record = fixture_corpus(1).pop().unwrap();
        let features = FeatureExtractor::new().extract(&record, &artifacts.encoder);

        let scorer = UnsupervisedScorer::new();
        let a = scorer.score(&features, &artifacts).unwrap();
        let b = scorer.score(&features, &artifacts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_flagged_record_exposes_top_features() {
        let artifacts = trained_artifacts();
        let mut record = fixture_corpus(1).pop().unwrap();
        record.amount = 500_000.0;
        record.banking_charge = 5_000.0;
        record.settled_amount = 495_000.0;

        let features = FeatureExtractor::new().extract(&record, &artifacts.encoder);
        let result = UnsupervisedScorer::new().score(&features, &artifacts).unwrap();
        assert!(result.is_anomaly);
        assert!(!result.top_features.is_empty());
    }

}
