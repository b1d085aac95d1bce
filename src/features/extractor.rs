//! Feature extraction from transaction records
//!
//! Extraction is total: it never fails, it substitutes documented fallbacks
//! and logs them. The one escape hatch is non-finite arithmetic (a
//! zero-amount record makes `charge_percent` infinite); the vector still
//! comes back and the engine converts it into a typed per-record error.

use crate::features::{CategoricalEncoder, FeatureVector, FEATURE_COLUMNS};
use crate::types::TransactionRecord;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

/// Extracts fixed-order feature vectors from raw records.
///
/// Pure function of `(record, encoder)`: same inputs always produce the
/// same vector, so single-record and batch scoring cannot drift.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the feature vector for one record.
    pub fn extract(&self, record: &TransactionRecord, encoder: &CategoricalEncoder) -> FeatureVector {
        let initiated = parse_timestamp(&record.timestamp_initiated).unwrap_or_else(|| {
            warn!(
                transaction_id = %record.transaction_id,
                raw = %record.timestamp_initiated,
                "unparseable timestamp_initiated, substituting current time"
            );
            Utc::now()
        });
        let completed = parse_timestamp(&record.timestamp_completed).unwrap_or_else(|| {
            warn!(
                transaction_id = %record.transaction_id,
                raw = %record.timestamp_completed,
                "unparseable timestamp_completed, substituting current time"
            );
            Utc::now()
        });

        // Always defined; zero or negative duration is a signal for the
        // models, not an extraction error.
        let duration_min = (completed - initiated).num_seconds() as f64 / 60.0;

        let settlement_delay_days = match parse_timestamp(&record.settlement_timestamp) {
            Some(settled) => (settled - completed).num_seconds() as f64 / 86_400.0,
            None => {
                if !record.settlement_timestamp.is_empty() {
                    warn!(
                        transaction_id = %record.transaction_id,
                        raw = %record.settlement_timestamp,
                        "unparseable settlement_timestamp, delay defaults to 0"
                    );
                }
                0.0
            }
        };

        let charge_percent = record.banking_charge / record.amount;
        let amount_per_minute = record.amount / (duration_min + 0.1);

        let mut values = Vec::with_capacity(FEATURE_COLUMNS.len());
        values.push(record.amount);
        values.push(record.banking_charge);
        values.push(record.settled_amount);
        values.push(record.retry_count as f64);
        values.push(duration_min);
        values.push(settlement_delay_days);
        values.push(charge_percent);
        values.push(amount_per_minute);
        values.push(encoder.encode("card_type", &record.card_type));
        values.push(encoder.encode("currency", &record.currency));
        values.push(encoder.encode("terminal_currency", &record.terminal_currency));

        FeatureVector::new(values)
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COLUMNS.len()
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_COLUMNS
    }
}

/// Parse an ISO 8601 timestamp, with or without an offset.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Upstream producers emit naive isoformat strings; treat them as UTC.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}
