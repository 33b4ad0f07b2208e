//! Medical-necessity decision.

use serde::{Deserialize, Serialize};

/// Outcome of evaluating a policy's criteria against the extracted data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NecessityDecision {
    /// True iff the satisfied count reaches the policy minimum.
    pub meets_criteria: bool,
    /// Descriptions of satisfied criteria, in policy order.
    pub satisfied_criteria: Vec<String>,
    /// Descriptions of unmet criteria, in policy order.
    pub missing_criteria: Vec<String>,
    /// Required documents not inferable from the transcript, in policy order.
    pub missing_documents: Vec<String>,
    /// Denial risk in `[0, 0.99]`, rounded to two decimals.
    pub denial_risk_score: f64,
    pub clinical_justification: String,
    /// True when the justification came from the extended-reasoning request.
    pub extended_reasoning_used: bool,
}
