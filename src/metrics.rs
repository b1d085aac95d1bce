//! Batch metrics and the persistence collaborator payload
//!
//! After a batch run the engine summarizes anomaly counts per reason. The
//! summary doubles as the payload the external persistence collaborator
//! accepts, keyed by a generated metric id.

use crate::types::EnrichedRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Count of one anomaly reason over a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyTypeCount {
    pub anomaly_type: String,
    pub count: u64,
}

/// Verdict-derived metric summary for one batch, as accepted by the
/// persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Generated identifier the collaborator keys the summary by.
    pub metric_id: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub metric_data: Vec<AnomalyTypeCount>,
}

/// Accumulates per-reason counts while a batch is written out.
#[derive(Debug, Default)]
pub struct BatchMetrics {
    rows: u64,
    anomalies: u64,
    errors: u64,
    /// Reason -> count, ordered for stable summaries.
    by_reason: BTreeMap<String, u64>,
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one output row into the counters.
    pub fn record_row(&mut self, row: &EnrichedRecord) {
        self.rows += 1;
        if !row.error.is_empty() {
            self.errors += 1;
            return;
        }
        if row.is_anomaly {
            self.anomalies += 1;
        }
        for reason in row.rule_anomalies.split(';').filter(|r| !r.is_empty()) {
            // Strip the variable suffix of parameterized reasons so counts
            // group by rule, not by distance value.
            let key = reason.split(" (").next().unwrap_or(reason);
            *self.by_reason.entry(key.to_string()).or_insert(0) += 1;
        }
        if row.iso_anomaly_reason != "normal" && !row.iso_anomaly_reason.is_empty() {
            *self
                .by_reason
                .entry("model_attributed".to_string())
                .or_insert(0) += 1;
        }
    }

    pub fn from_rows(rows: &[EnrichedRecord]) -> Self {
        let mut metrics = Self::new();
        for row in rows {
            metrics.record_row(row);
        }
        metrics
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Build the collaborator payload and log the summary.
    pub fn into_summary(self, file_name: &str) -> MetricSummary {
        let metric_data: Vec<AnomalyTypeCount> = self
            .by_reason
            .into_iter()
            .map(|(anomaly_type, count)| AnomalyTypeCount {
                anomaly_type,
                count,
            })
            .collect();

        info!(
            file_name,
            rows = self.rows,
            anomalies = self.anomalies,
            errors = self.errors,
            reasons = metric_data.len(),
            "batch summary"
        );

        MetricSummary {
            metric_id: uuid::Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            created_at: Utc::now(),
            metric_data,
        }
    }
}
