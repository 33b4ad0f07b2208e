//! Run records and their summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use priorauth_contracts::{
    policy::RetrievalSource,
    submission::SubmissionStatus,
    workflow::{NextAction, PriorAuthWorkflowResult, WorkflowTraceStep},
};
use priorauth_core::orchestrator::RunOptions;

/// Lifecycle of a run: `queued → running → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Twelve lowercase hex characters.
pub fn new_run_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

/// Everything the registry knows about one run.
///
/// Records are only ever handed out as clones, so a reader never observes a
/// record while a worker is appending to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    pub transcript: String,
    pub auto_approve: bool,
    pub reviewer_approved: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Steps streamed so far; replaced by the final trace on completion.
    pub trace: Vec<WorkflowTraceStep>,
    pub result: Option<PriorAuthWorkflowResult>,
    pub error: Option<String>,
    /// Terminal hash of the run's audit chain.
    pub audit_hash: Option<String>,
}

impl RunRecord {
    pub fn new(transcript: impl Into<String>, auto_approve: bool, reviewer_approved: Option<bool>) -> Self {
        Self {
            run_id: new_run_id(),
            status: RunStatus::Queued,
            transcript: transcript.into(),
            auto_approve,
            reviewer_approved,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            trace: Vec::new(),
            result: None,
            error: None,
            audit_hash: None,
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            auto_approve: self.auto_approve,
            reviewer_approved: self.reviewer_approved,
            run_id: Some(self.run_id.clone()),
        }
    }

    /// True when the last result stopped at human review.
    pub fn awaiting_approval(&self) -> bool {
        self.result
            .as_ref()
            .and_then(|r| r.submission.as_ref())
            .is_some_and(|s| s.status == SubmissionStatus::NeedsApproval)
    }

    /// Milliseconds between the first and last trace timestamps; `None`
    /// with fewer than two steps.
    pub fn duration_ms(&self) -> Option<i64> {
        if self.trace.len() < 2 {
            return None;
        }
        let first = self.trace.first()?;
        let last = self.trace.last()?;
        Some((last.timestamp - first.timestamp).num_milliseconds().max(0))
    }

    pub fn summary(&self) -> RunSummary {
        let result = self.result.as_ref();
        let coding = result.and_then(|r| r.coding.as_ref());
        let submission = result.and_then(|r| r.submission.as_ref());
        RunSummary {
            run_id: self.run_id.clone(),
            status: self.status,
            created_at: self.created_at,
            coding_source: coding.map(|c| c.source.clone()),
            diagnosis_code: coding.map(|c| c.diagnosis_code.clone()),
            procedure_code: coding.map(|c| c.procedure_code.clone()),
            denial_risk_score: result
                .and_then(|r| r.necessity.as_ref())
                .map(|n| n.denial_risk_score),
            submission_status: submission.map(|s| s.status),
            reference_id: submission
                .map(|s| s.reference_id.clone())
                .filter(|id| !id.is_empty()),
            retrieval_source: result.and_then(|r| r.policy.as_ref()).map(|p| p.source),
            next_action: result.and_then(|r| r.next_action),
            trace_len: self.trace.len(),
            duration_ms: self.duration_ms(),
            audit_hash: self.audit_hash.clone(),
            error: self.error.clone(),
        }
    }
}

/// Flat view of a run for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub coding_source: Option<String>,
    pub diagnosis_code: Option<String>,
    pub procedure_code: Option<String>,
    pub denial_risk_score: Option<f64>,
    pub submission_status: Option<SubmissionStatus>,
    pub reference_id: Option<String>,
    pub retrieval_source: Option<RetrievalSource>,
    pub next_action: Option<NextAction>,
    pub trace_len: usize,
    pub duration_ms: Option<i64>,
    pub audit_hash: Option<String>,
    pub error: Option<String>,
}
