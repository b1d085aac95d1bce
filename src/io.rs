//! CSV batch interface
//!
//! Reads raw record batches and writes enriched batches, one output row per
//! input row. The serde derives on the record types define the columns, so
//! the wire layout cannot drift from the data model.

use crate::error::EngineError;
use crate::types::{EnrichedRecord, TransactionRecord};
use std::path::Path;
use tracing::info;

/// Read an ordered batch of records from a CSV file.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<TransactionRecord>, EngineError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: TransactionRecord = row?;
        records.push(record);
    }
    info!(path = %path.display(), rows = records.len(), "batch read");
    Ok(records)
}

/// Output column order: every input column followed by the appended
/// verdict columns. Explicit because the csv serializer cannot flatten the
/// nested record struct.
const OUTPUT_COLUMNS: [&str; 36] = [
    "transaction_id",
    "account_id",
    "customer_id",
    "merchant_name",
    "store_name",
    "card_number",
    "card_type",
    "card_expire_date",
    "transaction_type",
    "transaction_status",
    "amount",
    "banking_charge",
    "settled_amount",
    "currency",
    "terminal_currency",
    "timestamp_initiated",
    "timestamp_completed",
    "settlement_timestamp",
    "voided_timestamp",
    "failure_reason_code",
    "failure_description",
    "retry_count",
    "device_id",
    "ip_address",
    "geo_location",
    "is_voided",
    "settlement_status",
    "created_by",
    "created_at",
    "is_anomaly",
    "is_anomaly_suspected_supervised",
    "is_anomaly_suspected_unsupervised",
    "anomaly_score",
    "rule_anomalies",
    "iso_anomaly_reason",
    "error",
];

/// Write the enriched batch, preserving input order.
pub fn write_enriched<P: AsRef<Path>>(
    path: P,
    rows: &[EnrichedRecord],
) -> Result<(), EngineError> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(OUTPUT_COLUMNS)?;
    for row in rows {
        let r = &row.record;
        writer.write_record([
            r.transaction_id.as_str(),
            r.account_id.as_str(),
            r.customer_id.as_str(),
            r.merchant_name.as_str(),
            r.store_name.as_str(),
            r.card_number.as_str(),
            r.card_type.as_str(),
            r.card_expire_date.as_str(),
            r.transaction_type.as_str(),
            r.transaction_status.as_str(),
            &r.amount.to_string(),
            &r.banking_charge.to_string(),
            &r.settled_amount.to_string(),
            r.currency.as_str(),
            r.terminal_currency.as_str(),
            r.timestamp_initiated.as_str(),
            r.timestamp_completed.as_str(),
            r.settlement_timestamp.as_str(),
            r.voided_timestamp.as_str(),
            r.failure_reason_code.as_str(),
            r.failure_description.as_str(),
            &r.retry_count.to_string(),
            r.device_id.as_str(),
            r.ip_address.as_str(),
            r.geo_location.as_str(),
            &r.is_voided.to_string(),
            r.settlement_status.as_str(),
            r.created_by.as_str(),
            r.created_at.as_str(),
            &row.is_anomaly.to_string(),
            &row.is_anomaly_suspected_supervised.to_string(),
            &row.is_anomaly_suspected_unsupervised.to_string(),
            row.anomaly_score.as_str(),
            row.rule_anomalies.as_str(),
            row.iso_anomaly_reason.as_str(),
            row.error.as_str(),
        ])?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = rows.len(), "batch written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixture_corpus;
    use crate::types::Verdict;

    #[test]
    fn test_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");

        let records = fixture_corpus(5);
        {
            let mut writer = csv::Writer::from_path(&path).unwrap();
            for record in &records {
                writer.serialize(record).unwrap();
            }
            writer.flush().unwrap();
        }

        let restored = read_records(&path).unwrap();
        assert_eq!(restored, records);
    }

    #[test]
    fn test_enriched_rows_written_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let rows: Vec<EnrichedRecord> = fixture_corpus(3)
            .into_iter()
            .map(|r| EnrichedRecord::from_verdict(r, &Verdict::normal(), false, false))
            .collect();
        write_enriched(&path, &rows).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("is_anomaly"));
        assert!(header.contains("rule_anomalies"));
        assert_eq!(lines.count(), 3);
    }

    #[test]
    fn test_missing_file_is_typed_error() {
        let err = read_records("/nonexistent/batch.csv").unwrap_err();
        assert!(matches!(err, EngineError::Csv(_)));
    }
}
