//! Categorical value encoding
//!
//! Codes are assigned once at training time from the observed domain and
//! frozen thereafter. Inference-time lookups of values outside the domain
//! return the `-1` sentinel and never mutate the encoder; "unseen category"
//! is a first-class anomaly signal downstream, not an error.

use crate::features::{CATEGORICAL_COLUMNS, UNSEEN_CODE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frozen mapping from categorical column to value codes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    domains: BTreeMap<String, BTreeMap<String, i64>>,
}

impl CategoricalEncoder {
    /// Build an encoder from the training corpus. Codes follow sorted value
    /// order within each column so repeated training runs over the same
    /// corpus assign identical codes.
    pub fn fit<'a, I>(column: &str, values: I, encoder: &mut CategoricalEncoder)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let domain = encoder.domains.entry(column.to_string()).or_default();
        let mut observed: Vec<&str> = values.into_iter().collect();
        observed.sort_unstable();
        observed.dedup();
        for value in observed {
            let next = domain.len() as i64;
            domain.entry(value.to_string()).or_insert(next);
        }
    }

    /// Convenience: fit all standard categorical columns from a value source.
    pub fn fit_columns<'a, F>(mut column_values: F) -> Self
    where
        F: FnMut(&str) -> Vec<&'a str>,
    {
        let mut encoder = CategoricalEncoder::default();
        for column in CATEGORICAL_COLUMNS {
            let values = column_values(column);
            Self::fit(column, values, &mut encoder);
        }
        encoder
    }

    /// Look up the code for a raw value; unseen values yield the sentinel.
    pub fn encode(&self, column: &str, value: &str) -> f64 {
        self.domains
            .get(column)
            .and_then(|d| d.get(value))
            .map(|code| *code as f64)
            .unwrap_or(UNSEEN_CODE)
    }

    /// Whether the raw value was part of the training domain.
    pub fn contains(&self, column: &str, value: &str) -> bool {
        self.domains
            .get(column)
            .map(|d| d.contains_key(value))
            .unwrap_or(false)
    }

    /// Size of a column's trained domain.
    pub fn domain_size(&self, column: &str) -> usize {
        self.domains.get(column).map(|d| d.len()).unwrap_or(0)
    }
}
