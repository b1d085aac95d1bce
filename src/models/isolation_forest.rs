//! Isolation forest outlier model
//!
//! Trained offline on the scaled historical feature matrix and frozen inside
//! the artifact bundle. Scoring is pure tree traversal, so identical inputs
//! against the same frozen trees reproduce bit-for-bit.
//!
//! Anomaly scores follow the standard formulation: shorter average isolation
//! path means easier to isolate means more anomalous. `anomaly_score` is in
//! (0, 1] with higher values more anomalous; the decision threshold is the
//! `1 - contamination` quantile of the training scores, fixed at fit time.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Subsample size per tree, capped by the corpus size.
const SUBSAMPLE_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Number of training rows that ended in this leaf.
        size: usize,
    },
}

/// One isolation tree as a node arena; index 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<TreeNode>,
}

impl IsolationTree {
    fn fit(matrix: &[Vec<f64>], sample: &[usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        Self::grow(matrix, sample, 0, max_depth, rng, &mut nodes);
        Self { nodes }
    }

    /// Grow a subtree over `sample` and return its node index.
    fn grow(
        matrix: &[Vec<f64>],
        sample: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
        nodes: &mut Vec<TreeNode>,
    ) -> usize {
        if sample.len() <= 1 || depth >= max_depth {
            nodes.push(TreeNode::Leaf { size: sample.len() });
            return nodes.len() - 1;
        }

        // Candidate features are those not constant over this sample.
        let columns = matrix[sample[0]].len();
        let splittable: Vec<usize> = (0..columns)
            .filter(|&f| {
                let first = matrix[sample[0]][f];
                sample.iter().any(|&row| matrix[row][f] != first)
            })
            .collect();
        if splittable.is_empty() {
            nodes.push(TreeNode::Leaf { size: sample.len() });
            return nodes.len() - 1;
        }

        let feature = splittable[rng.gen_range(0..splittable.len())];
        let lo = sample
            .iter()
            .map(|&row| matrix[row][feature])
            .fold(f64::INFINITY, f64::min);
        let hi = sample
            .iter()
            .map(|&row| matrix[row][feature])
            .fold(f64::NEG_INFINITY, f64::max);
        let threshold = rng.gen_range(lo..hi);

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = sample
            .iter()
            .copied()
            .partition(|&row| matrix[row][feature] < threshold);

        // Reserve the split slot before growing children so child indices
        // are known only after recursion.
        let index = nodes.len();
        nodes.push(TreeNode::Leaf { size: 0 });
        let left = Self::grow(matrix, &left_rows, depth + 1, max_depth, rng, nodes);
        let right = Self::grow(matrix, &right_rows, depth + 1, max_depth, rng, nodes);
        nodes[index] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    /// Isolation path length for one row, with the unbuilt-subtree
    /// adjustment at leaves holding more than one training row.
    fn path_length(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { size } => return depth + average_path_length(*size),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Average unsuccessful-search path length in a BST of `n` nodes; the
/// normalizing constant `c(n)` of the isolation forest formulation.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    let harmonic = (n - 1.0).ln() + 0.577_215_664_901_532_9;
    2.0 * harmonic - 2.0 * (n - 1.0) / n
}

/// Trained isolation forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// Subsample size the trees were grown on; normalizes path lengths.
    sample_size: usize,
    /// Decision boundary fixed at fit time from the contamination ratio.
    threshold: f64,
}

impl IsolationForest {
    /// Fit on a scaled feature matrix. The contamination ratio sets the
    /// decision threshold as a quantile of the training scores; it is not a
    /// runtime parameter.
    pub fn fit(matrix: &[Vec<f64>], n_trees: usize, contamination: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let sample_size = SUBSAMPLE_SIZE.min(matrix.len()).max(1);
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..n_trees)
            .map(|_| {
                let sample: Vec<usize> = (0..sample_size)
                    .map(|_| rng.gen_range(0..matrix.len()))
                    .collect();
                IsolationTree::fit(matrix, &sample, max_depth.max(1), &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            threshold: 0.0,
        };

        let mut scores: Vec<f64> = matrix.iter().map(|row| forest.anomaly_score(row)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let cut = (((1.0 - contamination) * scores.len() as f64).floor() as usize)
            .min(scores.len().saturating_sub(1));
        forest.threshold = scores[cut];
        forest
    }

    /// Anomaly score in (0, 1]; higher means shorter isolation paths and a
    /// more anomalous row.
    pub fn anomaly_score(&self, row: &[f64]) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(row))
            .sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.sample_size).max(f64::EPSILON);
        2_f64.powf(-mean_path / c)
    }

    /// Whether a row falls past the contamination-derived boundary.
    pub fn is_outlier(&self, row: &[f64]) -> bool {
        self.anomaly_score(row) > self.threshold
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tight cluster around the origin plus one far point.
    fn matrix_with_outlier() -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut matrix: Vec<Vec<f64>> = (0..200)
            .map(|_| vec![rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)])
            .collect();
        matrix.push(vec![25.0, -30.0]);
        matrix
    }

    #[test]
    fn test_outlier_scores_higher_than_inliers() {
        let matrix = matrix_with_outlier();
        let forest = IsolationForest::fit(&matrix, 100, 0.05, 42);

        let inlier = forest.anomaly_score(&[0.1, 0.0]);
        let outlier = forest.anomaly_score(&[25.0, -30.0]);
        assert!(outlier > inlier);
        assert!(forest.is_outlier(&[25.0, -30.0]));
    }

    #[test]
    fn test_scores_bounded() {
        let matrix = matrix_with_outlier();
        let forest = IsolationForest::fit(&matrix, 50, 0.05, 42);
        for row in &matrix {
            let score = forest.anomaly_score(row);
            assert!(score > 0.0 && score <= 1.0);
        }
    }

    #[test]
    fn test_fit_is_reproducible() {
        let matrix = matrix_with_outlier();
        let a = IsolationForest::fit(&matrix, 25, 0.05, 42);
        let b = IsolationForest::fit(&matrix, 25, 0.05, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let matrix = matrix_with_outlier();
        let forest = IsolationForest::fit(&matrix, 50, 0.05, 42);
        let row = [3.0, -2.0];
        assert_eq!(forest.anomaly_score(&row), forest.anomaly_score(&row));
    }

    #[test]
    fn test_serialization_round_trip() {
        let matrix = matrix_with_outlier();
        let forest = IsolationForest::fit(&matrix, 10, 0.05, 42);
        let json = serde_json::to_string(&forest).unwrap();
        let restored: IsolationForest = serde_json::from_str(&json).unwrap();
        assert_eq!(forest, restored);
    }

    #[test]
    fn test_average_path_length_known_values() {
        assert_eq!(average_path_length(1), 0.0);
        // c(2) = 2*(H(1)) - 2*(1/2) ~= 0.1544 with the Euler-Mascheroni
        // approximation of the harmonic number.
        assert!((average_path_length(2) - 0.1544).abs() < 0.01);
        assert!(average_path_length(256) > average_path_length(16));
    }
}
