//! Shared fixtures for unit tests
//!
//! A deterministic synthetic corpus: no RNG, every field derived from the
//! record index, so any test training on it reproduces the same artifacts.

use crate::config::{RulesConfig, TrainingConfig};
use crate::models::ModelArtifacts;
use crate::training::TrainingPipeline;
use crate::types::TransactionRecord;

/// Build `n` synthetic records. Roughly every tenth record carries a high
/// amount (fires `high_amount`), the rest are clean; card types cycle over
/// VISA / MASTERCARD / AMEX and currencies over USD / EUR / INR, with the
/// AMEX+INR combination avoided so proxy labels stay high-amount only.
pub fn fixture_corpus(n: usize) -> Vec<TransactionRecord> {
    (0..n).map(fixture_record).collect()
}

/// One synthetic record, fully determined by its index.
pub fn fixture_record(i: usize) -> TransactionRecord {
    let hot = i % 10 == 9;
    let amount = if hot {
        5000.0 + (i % 7) as f64 * 600.0
    } else {
        150.0 + (i % 29) as f64 * 95.0
    };
    let card_type = match i % 3 {
        0 => "VISA",
        1 => "MASTERCARD",
        _ => "AMEX",
    };
    let currency = if card_type == "AMEX" {
        if i % 2 == 0 {
            "USD"
        } else {
            "EUR"
        }
    } else {
        ["USD", "EUR", "INR"][i % 3]
    };

    let banking_charge = (amount * 0.01 * 100.0).round() / 100.0;
    let minute = i % 50;
    let duration = 5 + (i % 40);
    let initiated = format!("2024-03-01T{:02}:{:02}:00Z", 8 + (i % 12), minute);
    let completed_minute = minute + duration;
    let completed = format!(
        "2024-03-01T{:02}:{:02}:00Z",
        8 + (i % 12) + completed_minute / 60,
        completed_minute % 60
    );

    let mut record = TransactionRecord::new(&format!("tx_{i:05}"), amount, currency);
    record.account_id = format!("acct_{:04}", i % 40);
    record.customer_id = format!("cust_{:04}", i % 25);
    record.merchant_name = format!("merchant_{}", i % 12);
    record.card_number = format!("4{:015}", i % 500);
    record.card_type = card_type.to_string();
    record.card_expire_date = format!("{:02}/{}", 1 + (i % 12), 2027 + (i % 3));
    record.banking_charge = banking_charge;
    record.settled_amount = ((amount - banking_charge) * 100.0).round() / 100.0;
    record.terminal_currency = currency.to_string();
    record.timestamp_initiated = initiated;
    record.timestamp_completed = completed.clone();
    record.settlement_timestamp = completed.replace("2024-03-01", "2024-03-02");
    record.retry_count = (i % 4) as u32;
    record.device_id = format!("dev_{:04}", i % 60);
    record.ip_address = format!("203.0.113.{}", 1 + (i % 250));
    record.geo_location = "12.9716,77.5946".to_string();
    record
}

/// Artifacts trained on a 300-row fixture corpus with default config.
pub fn trained_artifacts() -> ModelArtifacts {
    TrainingPipeline::new(TrainingConfig::default(), RulesConfig::default())
        .train(&fixture_corpus(300))
        .expect("fixture corpus trains")
}
