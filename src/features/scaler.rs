//! Feature scaling and score normalization
//!
//! Both transforms are fit once at training time and frozen inside the
//! artifact bundle, so inference never re-derives statistics from the data
//! it is scoring.

use serde::{Deserialize, Serialize};

/// Per-column standardization: `(x - mean) / std`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and standard deviations over a feature matrix.
    pub fn fit(matrix: &[Vec<f64>]) -> Self {
        let columns = matrix.first().map(|row| row.len()).unwrap_or(0);
        let n = matrix.len().max(1) as f64;

        let mut means = vec![0.0; columns];
        for row in matrix {
            for (i, v) in row.iter().enumerate() {
                means[i] += v;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut stds = vec![0.0; columns];
        for row in matrix {
            for (i, v) in row.iter().enumerate() {
                stds[i] += (v - means[i]).powi(2);
            }
        }
        for std in &mut stds {
            *std = (*std / n).sqrt();
        }

        Self { means, stds }
    }

    /// Transform one row. Constant columns (std 0) pass through centered.
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(i, v)| {
                let centered = v - self.means[i];
                if self.stds[i] > 0.0 {
                    centered / self.stds[i]
                } else {
                    centered
                }
            })
            .collect()
    }

    pub fn transform_matrix(&self, matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
        matrix.iter().map(|row| self.transform(row)).collect()
    }

    pub fn columns(&self) -> usize {
        self.means.len()
    }
}

/// Min-max rescale of raw decision-function output into a closed range,
/// fit once on the training scores. Inference output is clamped so the
/// range holds even for scores outside anything seen during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreNormalizer {
    min: f64,
    max: f64,
    range_lo: f64,
    range_hi: f64,
}

impl ScoreNormalizer {
    /// Fit on training decision scores, mapping onto `[range_lo, range_hi]`.
    pub fn fit(scores: &[f64], range_lo: f64, range_hi: f64) -> Self {
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            min: if min.is_finite() { min } else { 0.0 },
            max: if max.is_finite() { max } else { 0.0 },
            range_lo,
            range_hi,
        }
    }

    /// Rescale one raw score into the target range.
    pub fn transform(&self, score: f64) -> f64 {
        let span = self.max - self.min;
        let unit = if span > 0.0 {
            ((score - self.min) / span).clamp(0.0, 1.0)
        } else {
            0.5
        };
        self.range_lo + unit * (self.range_hi - self.range_lo)
    }
}
