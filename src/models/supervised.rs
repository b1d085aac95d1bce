//! Supervised scorer
//!
//! Wraps the frozen random-forest classifier. The classifier is trained on
//! **proxy labels**: a training record is positive iff at least one rule
//! fired on it, not because it was verified fraud. Callers must present the
//! output as "looks like the kind of record the rules flag", never as
//! ground-truth-validated fraud detection.

use crate::error::EngineError;
use crate::features::{FeatureVector, FEATURE_COLUMNS};
use crate::models::artifacts::ModelArtifacts;

/// Typed result of one supervised evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupervisedScore {
    /// Argmax of the two-class probability vector.
    pub label: bool,
    /// Probability of the positive (anomalous) class in [0, 1].
    pub probability: f64,
}

/// Scores feature vectors against the frozen classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupervisedScorer;

impl SupervisedScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score one feature vector against the proxy-label classifier.
    pub fn score(
        &self,
        features: &FeatureVector,
        artifacts: &ModelArtifacts,
    ) -> Result<SupervisedScore, EngineError> {
        if features.len() != FEATURE_COLUMNS.len() {
            return Err(EngineError::FeatureDimensionMismatch {
                expected: FEATURE_COLUMNS.len(),
                got: features.len(),
            });
        }

        let scaled = artifacts.scaler.transform(features.values());
        let probability = artifacts.classifier.predict_proba(&scaled);
        Ok(SupervisedScore {
            label: probability >= 0.5,
            probability,
        })
    }
}
