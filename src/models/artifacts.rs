//! Versioned model artifact bundle
//!
//! The encoder, scaler, score normalizer, training statistics and both
//! models must agree on feature ordering and statistics, so they are
//! versioned, persisted and replaced strictly as one unit. Persistence
//! writes to a temp file and renames into place; a crashed writer leaves
//! the previous bundle intact, never a half-written one.

use crate::error::EngineError;
use crate::features::{CategoricalEncoder, ScoreNormalizer, StandardScaler, FEATURE_COLUMNS, NUMERIC_COLUMNS};
use crate::models::isolation_forest::IsolationForest;
use crate::models::random_forest::RandomForest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Mean and standard deviation of one feature over the training corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStat {
    pub mean: f64,
    pub std: f64,
}

/// Per-numeric-feature statistics, computed once per training run and
/// consumed read-only by reason attribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStatistics {
    stats: BTreeMap<String, FeatureStat>,
}

impl TrainingStatistics {
    /// Compute stats for the numeric columns of a feature matrix laid out
    /// in [`FEATURE_COLUMNS`] order.
    pub fn from_matrix(matrix: &[Vec<f64>]) -> Self {
        let n = matrix.len().max(1) as f64;
        let mut stats = BTreeMap::new();
        for (i, column) in NUMERIC_COLUMNS.iter().enumerate() {
            let mean = matrix.iter().map(|row| row[i]).sum::<f64>() / n;
            let variance = matrix.iter().map(|row| (row[i] - mean).powi(2)).sum::<f64>() / n;
            stats.insert(
                column.to_string(),
                FeatureStat {
                    mean,
                    std: variance.sqrt(),
                },
            );
        }
        Self { stats }
    }

    pub fn get(&self, column: &str) -> Option<FeatureStat> {
        self.stats.get(column).copied()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    #[cfg(test)]
    pub fn insert(&mut self, column: &str, mean: f64, std: f64) {
        self.stats.insert(column.to_string(), FeatureStat { mean, std });
    }
}

/// The immutable bundle produced by one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifacts {
    /// Version id assigned at training time.
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub encoder: CategoricalEncoder,
    pub scaler: StandardScaler,
    pub score_normalizer: ScoreNormalizer,
    pub statistics: TrainingStatistics,
    pub isolation_forest: IsolationForest,
    pub classifier: RandomForest,
}

impl ModelArtifacts {
    /// Internal consistency check run on every load. A bundle whose scaler
    /// disagrees with the module-wide column table was trained against a
    /// different feature layout and must not serve.
    fn validate(&self) -> Result<(), EngineError> {
        if self.scaler.columns() != FEATURE_COLUMNS.len() {
            return Err(EngineError::FeatureDimensionMismatch {
                expected: FEATURE_COLUMNS.len(),
                got: self.scaler.columns(),
            });
        }
        Ok(())
    }

    /// Load a bundle from disk, failing loudly on any missing or
    /// inconsistent piece.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let load = || -> anyhow::Result<Self> {
            let raw = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        };
        let artifacts = load().map_err(|source| EngineError::ArtifactLoad {
            path: path.display().to_string(),
            source,
        })?;
        artifacts.validate()?;
        info!(
            version = %artifacts.version,
            trained_at = %artifacts.trained_at,
            path = %path.display(),
            "model artifacts loaded"
        );
        Ok(artifacts)
    }

    /// Persist the bundle as one JSON document via temp-file + rename, so
    /// the swap on disk is atomic.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let path = path.as_ref();
        let persist = |artifacts: &Self| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let json = serde_json::to_string(artifacts)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, json)?;
            fs::rename(&tmp, path)
        };
        persist(self).map_err(|source| EngineError::ArtifactPersist {
            path: path.display().to_string(),
            source,
        })?;
        info!(version = %self.version, path = %path.display(), "model artifacts persisted");
        Ok(())
    }
}

/// Shared handle to the current artifact bundle.
///
/// Readers clone an `Arc` and score against a consistent snapshot for as
/// long as they hold it; reload swaps the pointer, never mutates in place,
/// so in-flight evaluations are unaffected.
#[derive(Debug)]
pub struct ArtifactStore {
    current: RwLock<Arc<ModelArtifacts>>,
}

impl ArtifactStore {
    pub fn new(artifacts: ModelArtifacts) -> Self {
        Self {
            current: RwLock::new(Arc::new(artifacts)),
        }
    }

    /// Load the bundle at `path` at startup. Failure here is fatal: the
    /// service refuses to serve rather than run with partial models.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        Ok(Self::new(ModelArtifacts::load(path)?))
    }

    /// Snapshot of the current bundle.
    pub fn current(&self) -> Arc<ModelArtifacts> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Atomically replace the whole bundle.
    pub fn swap(&self, artifacts: ModelArtifacts) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        info!(old = %guard.version, new = %artifacts.version, "swapping model artifacts");
        *guard = Arc::new(artifacts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COLUMNS;

    fn sample_artifacts() -> ModelArtifacts {
        let columns = FEATURE_COLUMNS.len();
        let matrix: Vec<Vec<f64>> = (0..20)
            .map(|i| (0..columns).map(|j| (i * columns + j) as f64).collect())
            .collect();
        let labels: Vec<bool> = (0..20).map(|i| i % 4 == 0).collect();

        ModelArtifacts {
            version: "v-test".to_string(),
            trained_at: Utc::now(),
            encoder: CategoricalEncoder::default(),
            scaler: StandardScaler::fit(&matrix),
            score_normalizer: ScoreNormalizer::fit(&[0.3, 0.7], 1.0, 100.0),
            statistics: TrainingStatistics::from_matrix(&matrix),
            isolation_forest: IsolationForest::fit(&matrix, 5, 0.1, 42),
            classifier: RandomForest::fit(&matrix, &labels, 5, 42),
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts.json");

        let artifacts = sample_artifacts();
        artifacts.save(&path).unwrap();

        let loaded = ModelArtifacts::load(&path).unwrap();
        assert_eq!(loaded, artifacts);
        // No temp file left behind after the rename.
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_missing_file_is_typed_error() {
        let err = ModelArtifacts::load("/nonexistent/artifacts.json").unwrap_err();
        assert!(matches!(err, EngineError::ArtifactLoad { .. }));
    }

    #[test]
    fn test_store_swap_replaces_whole_bundle() {
        let store = ArtifactStore::new(sample_artifacts());
        let before = store.current();

        let mut replacement = sample_artifacts();
        replacement.version = "v-next".to_string();
        store.swap(replacement);

        // The old snapshot is still fully usable; new readers see the new
        // version.
        assert_eq!(before.version, "v-test");
        assert_eq!(store.current().version, "v-next");
    }

    #[test]
    fn test_statistics_from_matrix() {
        let columns = FEATURE_COLUMNS.len();
        let matrix = vec![vec![2.0; columns], vec![4.0; columns]];
        let stats = TrainingStatistics::from_matrix(&matrix);

        let amount = stats.get("amount").unwrap();
        assert!((amount.mean - 3.0).abs() < 1e-9);
        assert!((amount.std - 1.0).abs() < 1e-9);
        assert_eq!(stats.len(), crate::features::NUMERIC_COLUMNS.len());
    }
}
