//! Workflow stages, trace steps, and the aggregate run result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    clinical::ExtractedClinicalData, coding::CodingResult, necessity::NecessityDecision,
    policy::PolicyMatch, submission::SubmissionResult,
};

/// The fixed, ordered stages of a prior-authorization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStage {
    #[serde(rename = "Voice Intake")]
    VoiceIntake,
    #[serde(rename = "Eligibility Verification")]
    EligibilityVerification,
    #[serde(rename = "Clinical Coding")]
    ClinicalCoding,
    #[serde(rename = "Knowledge Retrieval")]
    KnowledgeRetrieval,
    #[serde(rename = "Medical Necessity Analysis")]
    MedicalNecessityAnalysis,
    #[serde(rename = "Form Population")]
    FormPopulation,
    #[serde(rename = "Human Review")]
    HumanReview,
    #[serde(rename = "Portal Submission")]
    PortalSubmission,
}

impl WorkflowStage {
    /// Every stage in execution order.
    pub const ALL: [WorkflowStage; 8] = [
        Self::VoiceIntake,
        Self::EligibilityVerification,
        Self::ClinicalCoding,
        Self::KnowledgeRetrieval,
        Self::MedicalNecessityAnalysis,
        Self::FormPopulation,
        Self::HumanReview,
        Self::PortalSubmission,
    ];

    /// Human-readable stage name as shown in traces.
    pub fn name(&self) -> &'static str {
        match self {
            Self::VoiceIntake => "Voice Intake",
            Self::EligibilityVerification => "Eligibility Verification",
            Self::ClinicalCoding => "Clinical Coding",
            Self::KnowledgeRetrieval => "Knowledge Retrieval",
            Self::MedicalNecessityAnalysis => "Medical Necessity Analysis",
            Self::FormPopulation => "Form Population",
            Self::HumanReview => "Human Review",
            Self::PortalSubmission => "Portal Submission",
        }
    }
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Status of one trace step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Completed,
    Failed,
    Blocked,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        };
        f.write_str(tag)
    }
}

/// One entry of the append-only run trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTraceStep {
    pub stage: WorkflowStage,
    pub status: StepStatus,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl WorkflowTraceStep {
    /// Build a step stamped with the current UTC time.
    pub fn now(stage: WorkflowStage, status: StepStatus, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Terminal routing decision of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    CollectMissingMemberId,
    NotifyClinician,
    HumanReviewRequired,
    RetrySubmission,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectMissingMemberId => "collect_missing_member_id",
            Self::NotifyClinician => "notify_clinician",
            Self::HumanReviewRequired => "human_review_required",
            Self::RetrySubmission => "retry_submission",
        }
    }
}

impl std::fmt::Display for NextAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one workflow run produced.
///
/// Each optional field stays `None` until its stage completes, so a run that
/// stops at eligibility carries only the trace and the extracted data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorAuthWorkflowResult {
    pub trace: Vec<WorkflowTraceStep>,
    pub extracted_data: Option<ExtractedClinicalData>,
    pub coding: Option<CodingResult>,
    pub policy: Option<PolicyMatch>,
    pub necessity: Option<NecessityDecision>,
    pub submission: Option<SubmissionResult>,
    pub next_action: Option<NextAction>,
}
