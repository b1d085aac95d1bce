//! Transaction record structures for anomaly detection

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single card transaction as received from the upstream producer.
///
/// Records are immutable once received: the engine never mutates them, it
/// only derives a separate feature vector. Timestamps are carried as the
/// raw ISO 8601 strings they arrive with; parsing (and its fallbacks) is
/// the feature extractor's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub account_id: String,
    pub customer_id: String,
    pub merchant_name: String,
    #[serde(default)]
    pub store_name: String,

    /// Card number (PAN), used only for duplicate grouping.
    #[serde(default)]
    pub card_number: String,
    /// Card scheme, e.g. "VISA", "MASTERCARD", "AMEX", "RUPAY".
    pub card_type: String,
    /// Expiry in "MM/YYYY" form.
    #[serde(default)]
    pub card_expire_date: String,

    /// "ONLINE" or "OFFLINE".
    #[serde(default)]
    pub transaction_type: String,
    #[serde(default)]
    pub transaction_status: String,

    pub amount: f64,
    #[serde(default)]
    pub banking_charge: f64,
    #[serde(default)]
    pub settled_amount: f64,

    pub currency: String,
    #[serde(default)]
    pub terminal_currency: String,

    /// ISO 8601 timestamps.
    pub timestamp_initiated: String,
    pub timestamp_completed: String,
    #[serde(default)]
    pub settlement_timestamp: String,
    #[serde(default)]
    pub voided_timestamp: String,

    #[serde(default)]
    pub failure_reason_code: String,
    #[serde(default)]
    pub failure_description: String,

    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub ip_address: String,
    /// "lat,lon" of the transaction.
    #[serde(default)]
    pub geo_location: String,

    #[serde(default)]
    pub is_voided: bool,
    /// "SETTLED" or "NOT SETTLED".
    #[serde(default)]
    pub settlement_status: String,

    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: String,
}

impl TransactionRecord {
    /// Create a minimally populated record. Intended for tests and fixtures;
    /// production records arrive fully populated from the producer.
    pub fn new(transaction_id: &str, amount: f64, currency: &str) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            transaction_id: transaction_id.to_string(),
            account_id: String::new(),
            customer_id: String::new(),
            merchant_name: String::new(),
            store_name: String::new(),
            card_number: String::new(),
            card_type: "VISA".to_string(),
            card_expire_date: "01/2100".to_string(),
            transaction_type: "ONLINE".to_string(),
            transaction_status: "FAILED".to_string(),
            amount,
            banking_charge: (amount * 0.01 * 100.0).round() / 100.0,
            settled_amount: (amount * 0.99 * 100.0).round() / 100.0,
            currency: currency.to_string(),
            terminal_currency: currency.to_string(),
            timestamp_initiated: now.clone(),
            timestamp_completed: now.clone(),
            settlement_timestamp: now.clone(),
            voided_timestamp: String::new(),
            failure_reason_code: String::new(),
            failure_description: String::new(),
            retry_count: 0,
            device_id: String::new(),
            ip_address: "203.0.113.10".to_string(),
            geo_location: String::new(),
            is_voided: false,
            settlement_status: "SETTLED".to_string(),
            created_by: String::new(),
            created_at: now,
        }
    }
}
