//! Transaction Anomaly Engine
//!
//! Hybrid anomaly scoring for financial-card transactions: deterministic
//! business rules, an unsupervised outlier model and a supervised
//! classifier, merged into one explainable [`Verdict`] per record. The
//! engine is a pure computation contract: single-record and batch
//! evaluation share one code path, and all model state lives in an
//! immutable, atomically swapped [`ModelArtifacts`] bundle.

pub mod advisory;
pub mod config;
pub mod engine;
pub mod error;
pub mod explain;
pub mod features;
pub mod io;
pub mod metrics;
pub mod models;
pub mod rules;
pub mod training;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::AppConfig;
pub use engine::AnomalyEngine;
pub use error::EngineError;
pub use features::{FeatureExtractor, FeatureVector};
pub use models::{ArtifactStore, ModelArtifacts};
pub use training::TrainingPipeline;
pub use types::{Detection, DetectionSource, EnrichedRecord, TransactionRecord, Verdict};
