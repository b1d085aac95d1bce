//! Verdict and detection value types

use crate::types::transaction::TransactionRecord;
use serde::{Deserialize, Serialize};

/// Where a detection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetectionSource {
    Rule,
    Supervised,
    Unsupervised,
}

/// A single named finding about a record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub source: DetectionSource,
    pub reason: String,
    /// Model detections carry their score; rule detections usually do not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Detection {
    pub fn rule(reason: impl Into<String>) -> Self {
        Self {
            source: DetectionSource::Rule,
            reason: reason.into(),
            score: None,
        }
    }

    pub fn model(source: DetectionSource, reason: impl Into<String>, score: f64) -> Self {
        Self {
            source,
            reason: reason.into(),
            score: Some(score),
        }
    }
}

/// Final, immutable output of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_anomaly: bool,
    /// Rule detections in rule order, followed by at most one model detection.
    pub detections: Vec<Detection>,
    /// Normalized unsupervised score in [1, 100]; present iff a model fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_score: Option<f64>,
}

impl Verdict {
    /// A clean verdict: nothing fired.
    pub fn normal() -> Self {
        Self {
            is_anomaly: false,
            detections: Vec::new(),
            anomaly_score: None,
        }
    }

    /// All reason strings, in detection order.
    pub fn reasons(&self) -> Vec<&str> {
        self.detections.iter().map(|d| d.reason.as_str()).collect()
    }

    pub fn has_reason(&self, reason: &str) -> bool {
        self.detections.iter().any(|d| d.reason == reason)
    }
}

/// One row of batch output: the input record plus the appended verdict
/// columns. Failed rows keep their place with an error marker so the batch
/// always emits one output row per input row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: TransactionRecord,

    pub is_anomaly: bool,
    pub is_anomaly_suspected_supervised: bool,
    pub is_anomaly_suspected_unsupervised: bool,
    /// Empty string when absent, to keep the CSV column rectangular.
    pub anomaly_score: String,
    /// Rule reasons joined with ';'.
    pub rule_anomalies: String,
    /// Model-attributed reason, or "normal".
    pub iso_anomaly_reason: String,
    /// Error detail for rows that failed scoring; empty otherwise.
    pub error: String,
}

impl EnrichedRecord {
    /// Build an output row from a scored record.
    pub fn from_verdict(
        record: TransactionRecord,
        verdict: &Verdict,
        supervised_flag: bool,
        unsupervised_flag: bool,
    ) -> Self {
        let rule_anomalies = verdict
            .detections
            .iter()
            .filter(|d| d.source == DetectionSource::Rule)
            .map(|d| d.reason.clone())
            .collect::<Vec<_>>()
            .join(";");

        let iso_anomaly_reason = verdict
            .detections
            .iter()
            .find(|d| d.source != DetectionSource::Rule)
            .map(|d| d.reason.clone())
            .unwrap_or_else(|| "normal".to_string());

        Self {
            record,
            is_anomaly: verdict.is_anomaly,
            is_anomaly_suspected_supervised: supervised_flag,
            is_anomaly_suspected_unsupervised: unsupervised_flag,
            anomaly_score: verdict
                .anomaly_score
                .map(|s| format!("{s:.2}"))
                .unwrap_or_default(),
            rule_anomalies,
            iso_anomaly_reason,
            error: String::new(),
        }
    }

    /// Build an explicit error row for a record that failed scoring.
    pub fn from_error(record: TransactionRecord, detail: &str) -> Self {
        Self {
            record,
            is_anomaly: false,
            is_anomaly_suspected_supervised: false,
            is_anomaly_suspected_unsupervised: false,
            anomaly_score: String::new(),
            rule_anomalies: String::new(),
            iso_anomaly_reason: String::new(),
            error: detail.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_reasons() {
        let verdict = Verdict {
            is_anomaly: true,
            detections: vec![
                Detection::rule("high_amount"),
                Detection::model(DetectionSource::Unsupervised, "amount=9000.00 (outlier)", 87.0),
            ],
            anomaly_score: Some(87.0),
        };

        assert!(verdict.has_reason("high_amount"));
        assert_eq!(verdict.reasons().len(), 2);
    }

    #[test]
    fn test_enriched_record_splits_sources() {
        let record = TransactionRecord::new("tx_1", 100.0, "USD");
        let verdict = Verdict {
            is_anomaly: true,
            detections: vec![
                Detection::rule("currency_mismatch"),
                Detection::rule("high_amount"),
                Detection::model(DetectionSource::Unsupervised, "retry_count=15.00 (outlier)", 92.0),
            ],
            anomaly_score: Some(92.0),
        };

        let row = EnrichedRecord::from_verdict(record, &verdict, false, true);
        assert_eq!(row.rule_anomalies, "currency_mismatch;high_amount");
        assert_eq!(row.iso_anomaly_reason, "retry_count=15.00 (outlier)");
        assert_eq!(row.anomaly_score, "92.00");
    }

    #[test]
    fn test_error_row_keeps_place() {
        let record = TransactionRecord::new("tx_err", 0.0, "USD");
        let row = EnrichedRecord::from_error(record, "non-finite feature charge_percent");
        assert!(!row.is_anomaly);
        assert!(row.error.contains("charge_percent"));
    }
}
