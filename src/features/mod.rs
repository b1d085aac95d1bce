//! Feature vector definition and extraction
//!
//! The column set and column order are fixed module-wide: training and
//! inference must agree on them exactly, so they live here as constants
//! rather than configuration.

pub mod encoder;
pub mod extractor;
pub mod scaler;

pub use encoder::CategoricalEncoder;
pub use extractor::FeatureExtractor;
pub use scaler::{ScoreNormalizer, StandardScaler};

use serde::{Deserialize, Serialize};

/// Numeric feature columns, in vector order.
pub const NUMERIC_COLUMNS: [&str; 8] = [
    "amount",
    "banking_charge",
    "settled_amount",
    "retry_count",
    "transaction_duration",
    "settlement_delay_days",
    "charge_percent",
    "amount_per_minute",
];

/// Categorical feature columns, encoded after the numeric block.
pub const CATEGORICAL_COLUMNS: [&str; 3] = ["card_type", "currency", "terminal_currency"];

/// All feature columns in vector order: numerics first, then categorical
/// codes (suffixed `_code` in reports).
pub const FEATURE_COLUMNS: [&str; 11] = [
    "amount",
    "banking_charge",
    "settled_amount",
    "retry_count",
    "transaction_duration",
    "settlement_delay_days",
    "charge_percent",
    "amount_per_minute",
    "card_type_code",
    "currency_code",
    "terminal_currency_code",
];

/// Sentinel code for a categorical value absent from the trained encoder.
pub const UNSEEN_CODE: f64 = -1.0;

/// Fixed-order numeric representation of one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub(crate) fn new(values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), FEATURE_COLUMNS.len());
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for a named column. Panics on unknown names in debug builds
    /// only via the `position` lookup; callers use the module constants.
    pub fn get(&self, column: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|i| self.values[i])
    }

    /// First column whose value is non-finite, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.values
            .iter()
            .zip(FEATURE_COLUMNS.iter())
            .find(|(v, _)| !v.is_finite())
            .map(|(_, name)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_tables_agree() {
        assert_eq!(
            FEATURE_COLUMNS.len(),
            NUMERIC_COLUMNS.len() + CATEGORICAL_COLUMNS.len()
        );
        for (i, col) in NUMERIC_COLUMNS.iter().enumerate() {
            assert_eq!(FEATURE_COLUMNS[i], *col);
        }
    }

    #[test]
    fn test_get_by_name() {
        let fv = FeatureVector::new(vec![1.0; FEATURE_COLUMNS.len()]);
        assert_eq!(fv.get("amount"), Some(1.0));
        assert_eq!(fv.get("no_such_column"), None);
    }

    #[test]
    fn test_first_non_finite() {
        let mut values = vec![0.0; FEATURE_COLUMNS.len()];
        values[6] = f64::INFINITY;
        let fv = FeatureVector::new(values);
        assert_eq!(fv.first_non_finite(), Some("charge_percent"));
    }
}
