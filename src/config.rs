//! Configuration management for the anomaly detection engine

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub artifacts: ArtifactsConfig,
    pub rules: RulesConfig,
    pub training: TrainingConfig,
    pub logging: LoggingConfig,
}

/// Model artifact location
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Path of the versioned artifact bundle (one JSON document).
    pub path: String,
}

/// Thresholds for the deterministic rule set
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Amount above which `high_amount` fires.
    #[serde(default = "default_high_amount_threshold")]
    pub high_amount_threshold: f64,
    /// Expiry window for `card_expiring_high_amount`, in days.
    #[serde(default = "default_card_expiry_window_days")]
    pub card_expiry_window_days: u64,
    /// Customer's known location as "lat,lon".
    #[serde(default = "default_customer_location")]
    pub customer_location: String,
    /// Distance beyond which `geo_location_far` fires, in kilometers.
    #[serde(default = "default_geo_radius_km")]
    pub geo_radius_km: f64,
    /// Settlement delay beyond which `late_settlement` fires, in days.
    #[serde(default = "default_late_settlement_days")]
    pub late_settlement_days: u64,
    /// Percentage tolerance for `amount_mismatch`.
    #[serde(default = "default_amount_mismatch_tolerance_pct")]
    pub amount_mismatch_tolerance_pct: f64,
}

fn default_high_amount_threshold() -> f64 {
    4000.0
}

fn default_card_expiry_window_days() -> u64 {
    30
}

fn default_customer_location() -> String {
    // Reference point the historical corpus was collected around.
    "12.9716,77.5946".to_string()
}

fn default_geo_radius_km() -> f64 {
    50.0
}

fn default_late_settlement_days() -> u64 {
    3
}

fn default_amount_mismatch_tolerance_pct() -> f64 {
    2.0
}

/// Offline training parameters
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Expected fraction of outliers in the training corpus; fixes the
    /// isolation forest's implicit decision boundary.
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    /// Trees in the isolation forest.
    #[serde(default = "default_isolation_trees")]
    pub isolation_trees: usize,
    /// Trees in the supervised random forest.
    #[serde(default = "default_classifier_trees")]
    pub classifier_trees: usize,
    /// Below this many positive rows the minority class is upsampled.
    #[serde(default = "default_upsample_floor")]
    pub upsample_floor: usize,
    /// Upsampling target: positives drawn with replacement to this count.
    #[serde(default = "default_upsample_target")]
    pub upsample_target: usize,
    /// Held-out fraction for the stratified validation split.
    #[serde(default = "default_validation_split")]
    pub validation_split: f64,
    /// Seed for all training-time sampling; a fixed seed makes training
    /// runs reproducible over the same corpus.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_contamination() -> f64 {
    0.05
}

fn default_isolation_trees() -> usize {
    100
}

fn default_classifier_trees() -> usize {
    200
}

fn default_upsample_floor() -> usize {
    100
}

fn default_upsample_target() -> usize {
    150
}

fn default_validation_split() -> f64 {
    0.3
}

fn default_seed() -> u64 {
    42
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            high_amount_threshold: default_high_amount_threshold(),
            card_expiry_window_days: default_card_expiry_window_days(),
            customer_location: default_customer_location(),
            geo_radius_km: default_geo_radius_km(),
            late_settlement_days: default_late_settlement_days(),
            amount_mismatch_tolerance_pct: default_amount_mismatch_tolerance_pct(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            contamination: default_contamination(),
            isolation_trees: default_isolation_trees(),
            classifier_trees: default_classifier_trees(),
            upsample_floor: default_upsample_floor(),
            upsample_target: default_upsample_target(),
            validation_split: default_validation_split(),
            seed: default_seed(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifacts: ArtifactsConfig {
                path: "artifacts/model_artifacts.json".to_string(),
            },
            rules: RulesConfig::default(),
            training: TrainingConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}
