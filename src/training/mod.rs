//! Offline training pipeline
//!
//! Fits the categorical encoders, feature scaler, per-feature statistics
//! and both models from a historical corpus and bundles them into one
//! versioned [`ModelArtifacts`]. Runs single-threaded and offline; its only
//! interaction with the online scorer is publishing a new bundle.
//!
//! Supervised labels are proxies: a record is positive iff at least one
//! rule fired on it. The classifier therefore learns "rule-shaped" records,
//! not verified fraud.

use crate::config::{RulesConfig, TrainingConfig};
use crate::error::EngineError;
use crate::features::{CategoricalEncoder, FeatureExtractor, ScoreNormalizer, StandardScaler};
use crate::models::artifacts::{ModelArtifacts, TrainingStatistics};
use crate::models::isolation_forest::IsolationForest;
use crate::models::random_forest::RandomForest;
use crate::rules::RuleEngine;
use crate::types::TransactionRecord;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use uuid::Uuid;

/// Normalized score range shared with dashboards.
const SCORE_RANGE: (f64, f64) = (1.0, 100.0);

/// Fits a complete artifact bundle from historical records.
pub struct TrainingPipeline {
    config: TrainingConfig,
    rules: RuleEngine,
    extractor: FeatureExtractor,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig, rules_config: RulesConfig) -> Self {
        Self {
            config,
            rules: RuleEngine::new(rules_config),
            extractor: FeatureExtractor::new(),
        }
    }

    /// Train every artifact from the corpus and return the bundle.
    pub fn train(&self, records: &[TransactionRecord]) -> Result<ModelArtifacts, EngineError> {
        if records.len() < 10 {
            return Err(EngineError::Training(format!(
                "corpus too small: {} records, need at least 10",
                records.len()
            )));
        }

        // Encoder domains come from the training corpus only; anything the
        // corpus never showed stays unseen at inference time.
        let encoder = CategoricalEncoder::fit_columns(|column| {
            records
                .iter()
                .map(|r| raw_categorical(r, column))
                .filter(|v| !v.is_empty())
                .collect()
        });

        let mut matrix = Vec::with_capacity(records.len());
        let mut labels = Vec::with_capacity(records.len());
        let mut skipped = 0usize;
        for record in records {
            let features = self.extractor.extract(record, &encoder);
            if let Some(column) = features.first_non_finite() {
                warn!(
                    transaction_id = %record.transaction_id,
                    feature = column,
                    "dropping training row with non-finite feature"
                );
                skipped += 1;
                continue;
            }
            // Proxy label: positive iff any rule fired.
            labels.push(!self.rules.evaluate(record).is_empty());
            matrix.push(features.values().to_vec());
        }
        if matrix.len() < 10 {
            return Err(EngineError::Training(format!(
                "only {} usable rows after dropping {skipped} malformed ones",
                matrix.len()
            )));
        }

        let statistics = TrainingStatistics::from_matrix(&matrix);
        let scaler = StandardScaler::fit(&matrix);
        let scaled = scaler.transform_matrix(&matrix);

        let isolation_forest = IsolationForest::fit(
            &scaled,
            self.config.isolation_trees,
            self.config.contamination,
            self.config.seed,
        );
        let training_scores: Vec<f64> = scaled
            .iter()
            .map(|row| isolation_forest.anomaly_score(row))
            .collect();
        let score_normalizer = ScoreNormalizer::fit(&training_scores, SCORE_RANGE.0, SCORE_RANGE.1);

        let classifier = self.fit_classifier(&scaled, &labels)?;

        let artifacts = ModelArtifacts {
            version: Uuid::new_v4().to_string(),
            trained_at: Utc::now(),
            encoder,
            scaler,
            score_normalizer,
            statistics,
            isolation_forest,
            classifier,
        };
        info!(
            version = %artifacts.version,
            rows = matrix.len(),
            skipped,
            positives = labels.iter().filter(|&&l| l).count(),
            "training complete"
        );
        Ok(artifacts)
    }

    /// Fit the supervised classifier with imbalance correction and a
    /// stratified validation split.
    fn fit_classifier(
        &self,
        scaled: &[Vec<f64>],
        labels: &[bool],
    ) -> Result<RandomForest, EngineError> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let positives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i]).collect();
        let negatives: Vec<usize> = (0..labels.len()).filter(|&i| !labels[i]).collect();
        if positives.is_empty() || negatives.is_empty() {
            return Err(EngineError::Training(
                "proxy labels are single-class; classifier would be degenerate".to_string(),
            ));
        }

        // Upsample the minority class with replacement when it falls below
        // the floor, before splitting.
        let positives = if positives.len() < self.config.upsample_floor {
            info!(
                minority = positives.len(),
                target = self.config.upsample_target,
                "upsampling minority class with replacement"
            );
            (0..self.config.upsample_target)
                .map(|_| positives[rng.gen_range(0..positives.len())])
                .collect()
        } else {
            positives
        };

        // Stratified split: hold out the same fraction of each class.
        let (pos_train, pos_val) = split_class(&positives, self.config.validation_split, &mut rng);
        let (neg_train, neg_val) = split_class(&negatives, self.config.validation_split, &mut rng);

        let gather = |indices: &[usize]| -> (Vec<Vec<f64>>, Vec<bool>) {
            (
                indices.iter().map(|&i| scaled[i].clone()).collect(),
                indices.iter().map(|&i| labels[i]).collect(),
            )
        };
        let train_indices: Vec<usize> = pos_train.iter().chain(neg_train.iter()).copied().collect();
        let (train_x, train_y) = gather(&train_indices);

        let classifier = RandomForest::fit(
            &train_x,
            &train_y,
            self.config.classifier_trees,
            self.config.seed,
        );

        // Validation report on the held-out split.
        let val_indices: Vec<usize> = pos_val.iter().chain(neg_val.iter()).copied().collect();
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for &i in &val_indices {
            let predicted = classifier.predict(&scaled[i]);
            match (predicted, labels[i]) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
        }
        let precision = tp as f64 / (tp + fp).max(1) as f64;
        let recall = tp as f64 / (tp + fn_).max(1) as f64;
        info!(
            validation_rows = val_indices.len(),
            precision = format!("{precision:.3}"),
            recall = format!("{recall:.3}"),
            "classifier validation"
        );

        Ok(classifier)
    }
}

/// Shuffle a class's indices and split off the validation fraction.
fn split_class(indices: &[usize], validation: f64, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let mut shuffled = indices.to_vec();
    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }
    let held_out = ((shuffled.len() as f64) * validation).round() as usize;
    let train = shuffled.split_off(held_out.min(shuffled.len().saturating_sub(1)));
    (train, shuffled)
}

fn raw_categorical<'a>(record: &'a TransactionRecord, column: &str) -> &'a str {
    match column {
        "card_type" => &record.card_type,
        "currency" => &record.currency,
        "terminal_currency" => &record.terminal_currency,
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixture_corpus;

    fn pipeline() -> TrainingPipeline {
        TrainingPipeline::new(TrainingConfig::default(), RulesConfig::default())
    }

    #[test]
    fn test_train_produces_complete_bundle() {
        let corpus = fixture_corpus(300);
        let artifacts = pipeline().train(&corpus).unwrap();

        assert!(!artifacts.version.is_empty());
        assert_eq!(artifacts.scaler.columns(), crate::features::FEATURE_COLUMNS.len());
        assert_eq!(artifacts.statistics.len(), crate::features::NUMERIC_COLUMNS.len());
        assert!(artifacts.isolation_forest.tree_count() > 0);
        assert!(artifacts.classifier.tree_count() > 0);
    }

    #[test]
    fn test_encoder_domain_comes_from_corpus_only() {
        let corpus = fixture_corpus(100);
        let artifacts = pipeline().train(&corpus).unwrap();

        // The fixture corpus never emits this scheme, so it must be unseen.
        assert!(!artifacts.encoder.contains("card_type", "DINERS"));
        assert!(artifacts.encoder.contains("card_type", "VISA"));
    }

    #[test]
    fn test_tiny_corpus_rejected() {
        let corpus = fixture_corpus(5);
        let err = pipeline().train(&corpus).unwrap_err();
        assert!(matches!(err, EngineError::Training(_)));
    }

    #[test]
    fn test_training_is_reproducible() {
        let corpus = fixture_corpus(150);
        let a = pipeline().train(&corpus).unwrap();
        let b = pipeline().train(&corpus).unwrap();
        // Version and timestamp differ per run; everything learned from the
        // corpus must not.
        assert_eq!(a.encoder, b.encoder);
        assert_eq!(a.isolation_forest, b.isolation_forest);
        assert_eq!(a.classifier, b.classifier);
        assert_eq!(a.statistics, b.statistics);
    }
}
