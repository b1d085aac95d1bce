//! Trained models and the versioned artifact bundle

pub mod artifacts;
pub mod isolation_forest;
pub mod random_forest;
pub mod supervised;
pub mod unsupervised;

pub use artifacts::{ArtifactStore, FeatureStat, ModelArtifacts, TrainingStatistics};
pub use isolation_forest::IsolationForest;
pub use random_forest::RandomForest;
pub use supervised::{SupervisedScore, SupervisedScorer};
pub use unsupervised::{UnsupervisedScore, UnsupervisedScorer};
