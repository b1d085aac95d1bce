//! Random forest binary classifier
//!
//! CART trees with gini impurity, bootstrap row sampling and sqrt feature
//! subsampling per split. Probability of the positive class is the mean of
//! the per-tree leaf class fractions; the label is the argmax of the
//! two-class probability vector.
//!
//! Trained on proxy labels derived from the rule engine, not verified fraud
//! ground truth; see [`crate::models::supervised`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Depth cap; transaction feature vectors are shallow enough that deeper
/// trees only memorize the bootstrap sample.
const MAX_DEPTH: usize = 16;
const MIN_SAMPLES_SPLIT: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Fraction of positive training rows in this leaf.
        positive_fraction: f64,
    },
}

/// One decision tree as a node arena; index 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn fit(
        matrix: &[Vec<f64>],
        labels: &[bool],
        sample: &[usize],
        features_per_split: usize,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = Vec::new();
        Self::grow(matrix, labels, sample, 0, features_per_split, rng, &mut nodes);
        Self { nodes }
    }

    fn grow(
        matrix: &[Vec<f64>],
        labels: &[bool],
        sample: &[usize],
        depth: usize,
        features_per_split: usize,
        rng: &mut StdRng,
        nodes: &mut Vec<TreeNode>,
    ) -> usize {
        let positives = sample.iter().filter(|&&row| labels[row]).count();
        let pure = positives == 0 || positives == sample.len();
        if pure || sample.len() < MIN_SAMPLES_SPLIT || depth >= MAX_DEPTH {
            nodes.push(TreeNode::Leaf {
                positive_fraction: positives as f64 / sample.len().max(1) as f64,
            });
            return nodes.len() - 1;
        }

        let best = Self::best_split(matrix, labels, sample, features_per_split, rng);
        let (feature, threshold) = match best {
            Some(split) => split,
            None => {
                nodes.push(TreeNode::Leaf {
                    positive_fraction: positives as f64 / sample.len() as f64,
                });
                return nodes.len() - 1;
            }
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = sample
            .iter()
            .copied()
            .partition(|&row| matrix[row][feature] < threshold);

        let index = nodes.len();
        nodes.push(TreeNode::Leaf {
            positive_fraction: 0.0,
        });
        let left = Self::grow(matrix, labels, &left_rows, depth + 1, features_per_split, rng, nodes);
        let right = Self::grow(matrix, labels, &right_rows, depth + 1, features_per_split, rng, nodes);
        nodes[index] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    /// Best gini split over a random feature subset. Candidate thresholds
    /// are midpoints between consecutive distinct sorted values.
    fn best_split(
        matrix: &[Vec<f64>],
        labels: &[bool],
        sample: &[usize],
        features_per_split: usize,
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let columns = matrix[sample[0]].len();
        let mut candidates: Vec<usize> = (0..columns).collect();
        // Partial Fisher-Yates: the first `features_per_split` entries end
        // up as the random subset.
        for i in 0..features_per_split.min(columns) {
            let j = rng.gen_range(i..columns);
            candidates.swap(i, j);
        }
        candidates.truncate(features_per_split.min(columns));

        let mut best: Option<(usize, f64, f64)> = None;
        for &feature in &candidates {
            let mut values: Vec<f64> = sample.iter().map(|&row| matrix[row][feature]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();
            for pair in values.windows(2) {
                let threshold = (pair[0] + pair[1]) / 2.0;
                let impurity = Self::weighted_gini(matrix, labels, sample, feature, threshold);
                if best.map(|(_, _, g)| impurity < g).unwrap_or(true) {
                    best = Some((feature, threshold, impurity));
                }
            }
        }
        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn weighted_gini(
        matrix: &[Vec<f64>],
        labels: &[bool],
        sample: &[usize],
        feature: usize,
        threshold: f64,
    ) -> f64 {
        let mut left = (0usize, 0usize);
        let mut right = (0usize, 0usize);
        for &row in sample {
            let side = if matrix[row][feature] < threshold {
                &mut left
            } else {
                &mut right
            };
            side.0 += 1;
            if labels[row] {
                side.1 += 1;
            }
        }
        let gini = |(total, positives): (usize, usize)| {
            if total == 0 {
                return 0.0;
            }
            let p = positives as f64 / total as f64;
            1.0 - p * p - (1.0 - p) * (1.0 - p)
        };
        let n = sample.len() as f64;
        (left.0 as f64 / n) * gini(left) + (right.0 as f64 / n) * gini(right)
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { positive_fraction } => return *positive_fraction,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Trained random forest classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit on a feature matrix with boolean labels.
    pub fn fit(matrix: &[Vec<f64>], labels: &[bool], n_trees: usize, seed: u64) -> Self {
        debug_assert_eq!(matrix.len(), labels.len());
        let mut rng = StdRng::seed_from_u64(seed);
        let columns = matrix.first().map(|row| row.len()).unwrap_or(0);
        let features_per_split = (columns as f64).sqrt().round().max(1.0) as usize;

        let trees = (0..n_trees)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..matrix.len())
                    .map(|_| rng.gen_range(0..matrix.len()))
                    .collect();
                DecisionTree::fit(matrix, labels, &bootstrap, features_per_split, &mut rng)
            })
            .collect();

        Self { trees }
    }

    /// Probability of the positive class in [0, 1].
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees
            .iter()
            .map(|tree| tree.predict_proba(row))
            .sum::<f64>()
            / self.trees.len() as f64
    }

    /// Argmax of the two-class probability vector.
    pub fn predict(&self, row: &[f64]) -> bool {
        self.predict_proba(row) >= 0.5
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}
