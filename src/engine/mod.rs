//! The hybrid evaluation engine
//!
//! One per-row routine serves both the synchronous single-record path and
//! the batch path, so the two cannot drift. Batch evaluation adds the only
//! cross-row rule (duplicate detection, computed over a consistent snapshot
//! of the input) and converts per-row failures into explicit error rows:
//! one output row per input row, always.

pub mod aggregator;

pub use aggregator::DecisionAggregator;

use crate::config::RulesConfig;
use crate::error::EngineError;
use crate::explain::ReasonAttributor;
use crate::features::FeatureExtractor;
use crate::models::{ModelArtifacts, SupervisedScorer, UnsupervisedScorer};
use crate::rules::{duplicate_indices, RuleEngine};
use crate::types::{Detection, EnrichedRecord, TransactionRecord, Verdict};
use tracing::{debug, warn};

/// Result of one row inside a batch.
#[derive(Debug, Clone)]
pub struct RowOutcome {
    pub verdict: Verdict,
    pub supervised_flag: bool,
    pub unsupervised_flag: bool,
}

/// Evaluates records against a frozen artifact bundle.
///
/// Stateless apart from configuration; the artifacts are passed per call so
/// a reload elsewhere never changes an evaluation in flight.
pub struct AnomalyEngine {
    extractor: FeatureExtractor,
    rules: RuleEngine,
    attributor: ReasonAttributor,
    supervised: SupervisedScorer,
    unsupervised: UnsupervisedScorer,
    aggregator: DecisionAggregator,
}

impl AnomalyEngine {
    pub fn new(rules_config: RulesConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            rules: RuleEngine::new(rules_config),
            attributor: ReasonAttributor::new(),
            supervised: SupervisedScorer::new(),
            unsupervised: UnsupervisedScorer::new(),
            aggregator: DecisionAggregator::new(),
        }
    }

    /// Evaluate one record synchronously.
    ///
    /// Pure computation over `(record, artifacts)`: no I/O, no shared
    /// mutable state, safe to call concurrently across threads.
    pub fn evaluate(
        &self,
        record: &TransactionRecord,
        artifacts: &ModelArtifacts,
    ) -> Result<Verdict, EngineError> {
        Ok(self.evaluate_row(record, artifacts, Vec::new())?.verdict)
    }

    /// Evaluate an ordered batch. Per-row failures become explicit error
    /// rows instead of aborting the job, and the duplicate-transaction rule
    /// runs over the whole snapshot before aggregation.
    pub fn evaluate_batch(
        &self,
        records: &[TransactionRecord],
        artifacts: &ModelArtifacts,
    ) -> Vec<EnrichedRecord> {
        let duplicates = duplicate_indices(records);

        records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let extra = if duplicates.contains(&index) {
                    vec![Detection::rule("duplicate_transaction")]
                } else {
                    Vec::new()
                };
                match self.evaluate_row(record, artifacts, extra) {
                    Ok(row) => EnrichedRecord::from_verdict(
                        record.clone(),
                        &row.verdict,
                        row.supervised_flag,
                        row.unsupervised_flag,
                    ),
                    Err(err) => {
                        warn!(
                            transaction_id = %record.transaction_id,
                            error = %err,
                            "row failed scoring; emitting error row"
                        );
                        EnrichedRecord::from_error(record.clone(), &err.to_string())
                    }
                }
            })
            .collect()
    }

    /// The shared per-row routine: extract, rules, both scorers, attribute,
    /// aggregate.
    fn evaluate_row(
        &self,
        record: &TransactionRecord,
        artifacts: &ModelArtifacts,
        extra_detections: Vec<Detection>,
    ) -> Result<RowOutcome, EngineError> {
        let features = self.extractor.extract(record, &artifacts.encoder);
        if let Some(feature) = features.first_non_finite() {
            return Err(EngineError::NonFiniteFeature {
                transaction_id: record.transaction_id.clone(),
                feature,
            });
        }

        let mut rule_detections = self.rules.evaluate(record);
        rule_detections.extend(extra_detections);

        let supervised = self.supervised.score(&features, artifacts)?;
        let unsupervised = self.unsupervised.score(&features, artifacts)?;

        // Attribution runs only for model-only flags: a record the rules
        // already explain needs no second explanation.
        let model_fired = supervised.label || unsupervised.is_anomaly;
        let reason = if model_fired && rule_detections.is_empty() {
            self.attributor
                .explain(record, &features, &artifacts.statistics, &artifacts.encoder)
        } else {
            if model_fired {
                debug!(
                    transaction_id = %record.transaction_id,
                    "model flag already covered by rule detections"
                );
            }
            None
        };

        let verdict = self.aggregator.aggregate(
            &record.transaction_id,
            rule_detections,
            &supervised,
            &unsupervised,
            reason,
        );
        Ok(RowOutcome {
            verdict,
            supervised_flag: supervised.label,
            unsupervised_flag: unsupervised.is_anomaly,
        })
    }
}
