//! Batch-level duplicate transaction detection
//!
//! Duplicates cannot be seen from a single row: two records sharing card
//! number, amount, device, merchant and completion timestamp (but different
//! transaction ids) are both suspicious. This pass runs over a consistent
//! snapshot of the whole batch after per-row scoring, so duplicate pairing
//! is deterministic.

use crate::types::TransactionRecord;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DuplicateKey {
    card_number: String,
    /// Amount in integer cents; float identity is not a grouping key.
    amount_cents: i64,
    device_id: String,
    merchant_name: String,
    /// Completion timestamp at raw string precision.
    timestamp_completed: String,
}

impl DuplicateKey {
    fn from_record(record: &TransactionRecord) -> Self {
        Self {
            card_number: record.card_number.clone(),
            amount_cents: (record.amount * 100.0).round() as i64,
            device_id: record.device_id.clone(),
            merchant_name: record.merchant_name.clone(),
            timestamp_completed: record.timestamp_completed.clone(),
        }
    }
}

/// Indices of every record that shares its duplicate key with at least one
/// other record in the batch. All members of a duplicate group are flagged,
/// not just the later arrivals.
pub fn duplicate_indices(records: &[TransactionRecord]) -> HashSet<usize> {
    let mut groups: HashMap<DuplicateKey, Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        groups
            .entry(DuplicateKey::from_record(record))
            .or_default()
            .push(index);
    }

    groups
        .into_values()
        .filter(|members| members.len() > 1)
        .flatten()
        .collect()
}
