//! Stage and capability traits for the prior-authorization pipeline.
//!
//! The orchestrator only ever talks to these traits:
//!
//! - `IntakeAgent`: transcript parsing (collaborator)
//! - `ClinicalCoder`: diagnosis/procedure coding
//! - `PolicyRetriever`: payer policy selection
//! - `NecessityAssessor`: criteria evaluation, denial risk, justification
//! - `SubmissionAdapter`: review snapshot and portal submission (collaborator)
//!
//! Two further traits describe optional external capabilities consumed by the
//! stages above: `ReasoningBackend` (text generation) and `KnowledgeBase`
//! (semantic passage retrieval). Each has a production implementation and a
//! deterministic disabled implementation, chosen by configuration.
//!
//! `TraceObserver` receives every trace step as it is appended.

use priorauth_contracts::{
    capability::{KnowledgePassage, ReasoningRequest, ReasoningResponse},
    clinical::ExtractedClinicalData,
    coding::CodingResult,
    error::PriorAuthResult,
    necessity::NecessityDecision,
    policy::PolicyMatch,
    submission::{FormPayload, SubmissionResult},
    workflow::WorkflowTraceStep,
};

/// Turns a clinician transcript into structured clinical data.
pub trait IntakeAgent: Send + Sync {
    fn ingest(&self, transcript: &str) -> PriorAuthResult<ExtractedClinicalData>;
}

/// Maps extracted clinical signal to diagnosis and procedure codes.
pub trait ClinicalCoder: Send + Sync {
    /// Resolve codes for `extracted`.
    ///
    /// Implementations recover from capability failures internally. An `Err`
    /// is only returned when the caller opted into strict mode.
    fn map_codes(&self, extracted: &ExtractedClinicalData) -> PriorAuthResult<CodingResult>;
}

/// Selects the payer policy governing a request.
///
/// Infallible by contract: retrieval failures degrade to local scoring and a
/// catalog default always exists.
pub trait PolicyRetriever: Send + Sync {
    fn retrieve(
        &self,
        payer_name: &str,
        member_id: &str,
        procedure_code: &str,
        requested_service: &str,
    ) -> PolicyMatch;
}

/// Evaluates medical necessity against a selected policy.
pub trait NecessityAssessor: Send + Sync {
    /// Returns `Err` only when a strict justification mode is configured and
    /// every justification strategy failed.
    fn evaluate_medical_necessity(
        &self,
        extracted: &ExtractedClinicalData,
        coding: &CodingResult,
        policy: &PolicyMatch,
    ) -> PriorAuthResult<NecessityDecision>;
}

/// Executes the final portal submission.
///
/// Retries belong here, not in the orchestrator. Network failures are
/// reported as a `failed` result, never raised.
pub trait SubmissionAdapter: Send + Sync {
    /// Render the text a clinician reviews before approving.
    fn generate_review_snapshot(&self, payload: &FormPayload) -> String;

    /// Submit `payload`. Unapproved payloads must not leave the process.
    fn submit(&self, payload: &FormPayload, approved: bool, review_snapshot: &str) -> SubmissionResult;
}

/// An external text-generation capability.
pub trait ReasoningBackend: Send + Sync {
    /// Short name used in logs and error variants.
    fn name(&self) -> &str;

    fn invoke(&self, request: &ReasoningRequest) -> PriorAuthResult<ReasoningResponse>;
}

/// An external semantic retrieval capability.
pub trait KnowledgeBase: Send + Sync {
    fn retrieve(&self, query: &str, top_k: usize) -> PriorAuthResult<Vec<KnowledgePassage>>;
}

/// Receives trace steps synchronously as the orchestrator appends them.
///
/// Observers cannot veto or alter a step, and a slow observer only delays
/// the stage that emitted it.
pub trait TraceObserver {
    fn on_step(&self, step: &WorkflowTraceStep);
}

impl<F> TraceObserver for F
where
    F: Fn(&WorkflowTraceStep),
{
    fn on_step(&self, step: &WorkflowTraceStep) {
        self(step)
    }
}
