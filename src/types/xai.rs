use serde::{Deserialize, Serialize};

/// Explanation payload returned by `GET /api/anomalies/{id}/xai`.
///
/// The section entries are loosely shaped objects assembled server-side
/// (signal/explanation, step/action/reason, control/purpose); they are
/// carried opaquely and rendered as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XaiExplanation {
    #[serde(default, alias = "why_flagged")]
    pub why_flagged: Vec<serde_json::Value>,
    #[serde(default, alias = "remediation_steps")]
    pub remediation_steps: Vec<serde_json::Value>,
    #[serde(default, alias = "preventive_measures")]
    pub preventive_measures: Vec<serde_json::Value>,
    #[serde(default)]
    pub evidence: Vec<serde_json::Value>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "risk_score")]
    pub risk_score: u8,
    #[serde(default)]
    pub confidence: f64,
}
