//! Reason attribution for model-flagged records
//!
//! When a model flags a record the rules did not already explain, this
//! module names the feature that most plausibly caused the flag. Selection
//! is deterministic: unseen categorical values win first (in feature-column
//! order), then the numeric feature with the largest relative deviation
//! past three sigma, ties broken by column order. The same ranking drives
//! the top-contributor list the unsupervised scorer exposes.

use crate::features::{CategoricalEncoder, FeatureVector, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};
use crate::models::artifacts::TrainingStatistics;
use crate::types::TransactionRecord;
use tracing::debug;

/// Swappable per-feature contribution ranking.
///
/// The default implementation ranks by z-score magnitude against the
/// training statistics. A heavier additive-attribution implementation can
/// slot in behind the same contract without touching the scorers.
pub trait AttributionStrategy: Send + Sync {
    /// Feature names with contribution magnitudes, most contributing first.
    /// Features with degenerate statistics (`std == 0`) are excluded.
    fn contributions(
        &self,
        features: &FeatureVector,
        statistics: &TrainingStatistics,
    ) -> Vec<(&'static str, f64)>;
}

/// Ranks numeric features by `|value - mean| / std`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZScoreAttribution;

impl AttributionStrategy for ZScoreAttribution {
    fn contributions(
        &self,
        features: &FeatureVector,
        statistics: &TrainingStatistics,
    ) -> Vec<(&'static str, f64)> {
        let mut ranked: Vec<(&'static str, f64)> = NUMERIC_COLUMNS
            .iter()
            .filter_map(|column| {
                let value = features.get(column)?;
                let stat = statistics.get(column)?;
                if stat.std > 0.0 {
                    Some((*column, (value - stat.mean).abs() / stat.std))
                } else {
                    None
                }
            })
            .collect();
        // Stable sort keeps column order among equal magnitudes.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// Derives a human-readable explanation for a model-only flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasonAttributor {
    attribution: ZScoreAttribution,
}

impl ReasonAttributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explain a flagged record, or return `None` when no feature
    /// qualifies: "flagged but unexplainable" is a real outcome, never
    /// papered over with a dummy string.
    pub fn explain(
        &self,
        record: &TransactionRecord,
        features: &FeatureVector,
        statistics: &TrainingStatistics,
        encoder: &CategoricalEncoder,
    ) -> Option<String> {
        // Unseen categorical values take priority: they are the sharpest
        // signal and need no statistics.
        for column in CATEGORICAL_COLUMNS {
            let raw = raw_categorical(record, column);
            if !raw.is_empty() && !encoder.contains(column, raw) {
                return Some(format!("{column}={raw} (unseen category)"));
            }
        }

        // 3-sigma test over numeric features; the z-score ranking already
        // excludes degenerate (std == 0) features and sorts by relative
        // deviation, so the first entry past 3 wins.
        let ranked = self.attribution.contributions(features, statistics);
        for (column, z) in ranked {
            if z > 3.0 {
                let value = features.get(column).unwrap_or_default();
                return Some(format!("{column}={value:.2} (outlier)"));
            }
        }

        debug!(
            transaction_id = %record.transaction_id,
            "model flagged record but no feature qualifies for attribution"
        );
        None
    }

    /// Top contributing feature names for a flagged record, for scorer
    /// explanations and dashboards.
    pub fn top_features(
        &self,
        features: &FeatureVector,
        statistics: &TrainingStatistics,
        n: usize,
    ) -> Vec<&'static str> {
        self.attribution
            .contributions(features, statistics)
            .into_iter()
            .take(n)
            .map(|(column, _)| column)
            .collect()
    }
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
    use crate::features::FeatureExtractor;

    fn encoder() -> CategoricalEncoder {
        CategoricalEncoder::fit_columns(|column| match column {
            "card_type" => vec!["VISA", "MASTERCARD", "AMEX"],
            "currency" | "terminal_currency" => vec!["INR", "USD", "EUR"],
            _ => vec![],
        })
    }

    fn statistics() -> TrainingStatistics {
        let mut stats = TrainingStatistics::default();
        stats.insert("amount", 1000.0, 500.0);
        stats.insert("banking_charge", 10.0, 5.0);
        stats.insert("settled_amount", 990.0, 500.0);
        stats.insert("retry_count", 1.0, 1.0);
        stats.insert("transaction_duration", 30.0, 20.0);
        stats.insert("settlement_delay_days", 1.0, 0.5);
        stats.insert("charge_percent", 0.01, 0.002);
        stats.insert("amount_per_minute", 40.0, 30.0);
        stats
    }

    fn record() -> TransactionRecord {
        let mut r = TransactionRecord::new("tx_explain", 1000.0, "USD");
        r.timestamp_initiated = "2024-03-01T10:00:00Z".to_string();
        r.timestamp_completed = "2024-03-01T10:30:00Z".to_string();
        r.settlement_timestamp = "2024-03-02T10:30:00Z".to_string();
        r
    }

    fn features_for(record: &TransactionRecord) -> FeatureVector {
        FeatureExtractor::new().extract(record, &encoder())
    }

    #[test]
    fn test_unseen_category_wins_over_outlier() {
        let mut r = record();
        r.card_type = "RUPAY".to_string();
        r.amount = 50_000.0; // also a massive numeric outlier

        let reason = ReasonAttributor::new()
            .explain(&r, &features_for(&r), &statistics(), &encoder())
            .unwrap();
        assert_eq!(reason, "card_type=RUPAY (unseen category)");
    }

    #[test]
    fn test_three_sigma_outlier_reason() {
        let mut r = record();
        r.amount = 50_000.0; // z = 98 on amount
        r.banking_charge = 500.0;
        r.settled_amount = 49_500.0;

        let reason = ReasonAttributor::new()
            .explain(&r, &features_for(&r), &statistics(), &encoder())
            .unwrap();
        assert!(reason.contains("(outlier)"));
        // amount has the largest relative deviation and wins the tie-break.
        assert!(reason.starts_with("amount="));
    }

    #[test]
    fn test_unremarkable_record_yields_none() {
        let r = record();
        let reason =
            ReasonAttributor::new().explain(&r, &features_for(&r), &statistics(), &encoder());
        assert_eq!(reason, None);
    }

    #[test]
    fn test_zero_std_feature_is_skipped() {
        let mut stats = statistics();
        // Degenerate stat: every deviation would be "infinite sigma".
        stats.insert("retry_count", 0.0, 0.0);

        let mut r = record();
        r.retry_count = 500;

        // retry_count cannot fire; nothing else deviates, so no reason.
        let reason = ReasonAttributor::new().explain(&r, &features_for(&r), &stats, &encoder());
        assert_eq!(reason, None);
    }

    #[test]
    fn test_top_features_ranked_by_deviation() {
        let mut r = record();
        r.amount = 50_000.0;
        r.banking_charge = 500.0;
        r.settled_amount = 49_500.0;

        let top = ReasonAttributor::new().top_features(&features_for(&r), &statistics(), 3);
        assert_eq!(top.len(), 3);
        assert!(top.contains(&"amount"));
    }

    #[test]
    fn test_explanation_is_deterministic() {
        let mut r = record();
        r.amount = 50_000.0;
        let attributor = ReasonAttributor::new();
        let fv = features_for(&r);
        let first = attributor.explain(&r, &fv, &statistics(), &encoder());
        let second = attributor.explain(&r, &fv, &statistics(), &encoder());
        assert_eq!(first, second);
    }
}
