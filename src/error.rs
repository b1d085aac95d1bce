//! Error taxonomy for the anomaly detection engine
//!
//! Input malformation is never an error here: timestamps, numerics and
//! categoricals all have documented fallbacks inside feature extraction.
//! These variants cover the cases that must surface to the caller: artifact
//! problems are fatal at startup, per-record failures become explicit error
//! rows in batch output.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Artifact bundle could not be read or parsed. Fatal at startup: the
    /// engine refuses to score with partial models.
    #[error("failed to load model artifacts from {path}: {source}")]
    ArtifactLoad {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// Artifact bundle could not be persisted.
    #[error("failed to persist model artifacts to {path}: {source}")]
    ArtifactPersist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A derived feature came out non-finite (e.g. charge_percent on a
    /// zero-amount record). Caught at the per-record boundary.
    #[error("record {transaction_id}: non-finite value for feature {feature}")]
    NonFiniteFeature {
        transaction_id: String,
        feature: &'static str,
    },

    /// Feature vector does not match what the artifacts were trained on.
    /// Always a defect, never a runtime branch worth recovering from.
    #[error("feature dimension mismatch: expected {expected}, got {got}")]
    FeatureDimensionMismatch { expected: usize, got: usize },

    /// Training was asked to run on an unusable corpus.
    #[error("training corpus rejected: {0}")]
    Training(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
