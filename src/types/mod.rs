//! Type definitions for the anomaly detection engine

pub mod transaction;
pub mod verdict;

pub use transaction::TransactionRecord;
pub use verdict::{Detection, DetectionSource, EnrichedRecord, Verdict};
