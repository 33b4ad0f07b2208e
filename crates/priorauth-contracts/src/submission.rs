//! Submission payload and result types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Form fields sent to the payer portal, keyed by field name and iterated
/// in key order.
pub type FormPayload = BTreeMap<String, String>;

/// Terminal status reported by a submission adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// The form is pre-filled but the clinician has not approved it.
    NeedsApproval,
    Submitted,
    Failed,
}

impl SubmissionStatus {
    /// Map a portal status string onto the three known statuses.
    ///
    /// Anything unrecognised counts as a failure.
    pub fn from_portal(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "submitted" => Self::Submitted,
            "needs_approval" => Self::NeedsApproval,
            _ => Self::Failed,
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::NeedsApproval => "needs_approval",
            Self::Submitted => "submitted",
            Self::Failed => "failed",
        };
        f.write_str(tag)
    }
}

/// What a submission adapter reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub status: SubmissionStatus,
    pub message: String,
    /// Portal reference id; empty unless submitted.
    pub reference_id: String,
    /// The review snapshot the decision was made against.
    pub review_snapshot: String,
    /// The payload as submitted.
    pub payload: FormPayload,
    /// Adapter mode tag, e.g. `http` or `dry_run`.
    #[serde(default)]
    pub mode: String,
}
