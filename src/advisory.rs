//! Advisory collaborator contract
//!
//! An advisory provider may enrich a scored record with a classification
//! and a suggested action. The engine treats this as optional enrichment:
//! its own Verdict never depends on an advisory call succeeding. The
//! transport-backed provider (an external language-model service) lives
//! outside this crate; the deterministic rules-only fallback ships here.

use crate::types::TransactionRecord;
use serde::{Deserialize, Serialize};

/// What the engine hands to an advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub record: TransactionRecord,
    pub is_anomaly_suspected_supervised: bool,
    pub is_anomaly_suspected_unsupervised: bool,
    /// Rule reasons that fired for the record.
    pub rule_anomalies: Vec<String>,
}

/// What an advisor returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    pub anomaly: bool,
    pub anomaly_type: String,
    /// "RULE", "MODEL" or "NONE".
    pub classification: String,
    pub explanation: String,
    pub suggested_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_score: Option<f64>,
}

/// Optional enrichment seam. Implementations must be deterministic enough
/// for audit trails or document that they are not.
pub trait AdvisoryProvider: Send + Sync {
    fn advise(&self, request: &AdvisoryRequest) -> AdvisoryResponse;
}

/// Fallback advisor built purely from the signals already in the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesOnlyAdvisor;

impl AdvisoryProvider for RulesOnlyAdvisor {
    fn advise(&self, request: &AdvisoryRequest) -> AdvisoryResponse {
        let model_suspected = request.is_anomaly_suspected_supervised
            || request.is_anomaly_suspected_unsupervised;

        if let Some(first_rule) = request.rule_anomalies.first() {
            return AdvisoryResponse {
                anomaly: true,
                anomaly_type: first_rule.clone(),
                classification: "RULE".to_string(),
                explanation: format!(
                    "rule detections: {}",
                    request.rule_anomalies.join(", ")
                ),
                suggested_action: "hold transaction for manual review".to_string(),
                anomaly_score: None,
            };
        }

        if model_suspected {
            return AdvisoryResponse {
                anomaly: true,
                anomaly_type: "model_flagged".to_string(),
                classification: "MODEL".to_string(),
                explanation: "statistical models flagged the record; no rule fired".to_string(),
                suggested_action: "review against recent account activity".to_string(),
                anomaly_score: None,
            };
        }

        AdvisoryResponse {
            anomaly: false,
            anomaly_type: "none".to_string(),
            classification: "NONE".to_string(),
            explanation: "no rule or model signal".to_string(),
            suggested_action: "none".to_string(),
            anomaly_score: None,
        }
    }
}
