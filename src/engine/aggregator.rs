//! Decision aggregation
//!
//! Merges rule detections and the two model results into one Verdict. Rule
//! detections are kept verbatim. A model detection is surfaced only when at
//! least one scorer fired AND attribution produced a reason; a flagged but
//! unexplainable model result is logged, never shown to users as an opaque
//! "anomaly, reason unknown" record.

use crate::models::{SupervisedScore, UnsupervisedScore};
use crate::types::{Detection, DetectionSource, Verdict};
use tracing::debug;

/// Pure merge of the three signal sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionAggregator;

impl DecisionAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Merge all signals for one record into a Verdict.
    pub fn aggregate(
        &self,
        transaction_id: &str,
        rule_detections: Vec<Detection>,
        supervised: &SupervisedScore,
        unsupervised: &UnsupervisedScore,
        reason: Option<String>,
    ) -> Verdict {
        let mut detections = rule_detections;
        let model_fired = supervised.label || unsupervised.is_anomaly;

        if model_fired {
            match reason {
                Some(reason) => {
                    detections.push(self.model_detection(supervised, unsupervised, reason));
                }
                None => {
                    debug!(
                        transaction_id,
                        supervised = supervised.label,
                        unsupervised = unsupervised.is_anomaly,
                        "model flagged record without attributable reason; not surfaced"
                    );
                }
            }
        }

        Verdict {
            is_anomaly: !detections.is_empty(),
            detections,
            // The unsupervised score is the only one with a guaranteed
            // bounded scale, so it is the verdict score even when only the
            // supervised model fired.
            anomaly_score: model_fired.then_some(unsupervised.score),
        }
    }

    /// Attribute the model detection to whichever scorer is more confident,
    /// compared on the shared 1-100 scale; ties prefer supervised.
    fn model_detection(
        &self,
        supervised: &SupervisedScore,
        unsupervised: &UnsupervisedScore,
        reason: String,
    ) -> Detection {
        let supervised_scaled = 1.0 + supervised.probability * 99.0;
        match (supervised.label, unsupervised.is_anomaly) {
            (true, false) => Detection::model(DetectionSource::Supervised, reason, supervised_scaled),
            (false, true) => {
                Detection::model(DetectionSource::Unsupervised, reason, unsupervised.score)
            }
            _ => {
                if unsupervised.score > supervised_scaled {
                    Detection::model(DetectionSource::Unsupervised, reason, unsupervised.score)
                } else {
                    Detection::model(DetectionSource::Supervised, reason, supervised_scaled)
                }
            }
        }
    }
}
