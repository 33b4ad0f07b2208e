//! The prior-authorization orchestrator: a strictly linear stage machine.
//!
//!   Voice Intake → Eligibility Verification → Clinical Coding →
//!   Knowledge Retrieval → Medical Necessity Analysis → Form Population →
//!   Human Review → Portal Submission
//!
//! Every stage appends an `in_progress` trace step, does its work, then
//! appends exactly one terminal step for that stage. The only branch inside
//! the sequence is eligibility: a run without a member id stops there with
//! `collect_missing_member_id`. After submission, routing is a pure function
//! of the submission status.

use tracing::{debug, info, warn};
use uuid::Uuid;

use priorauth_contracts::{
    error::{PriorAuthError, PriorAuthResult},
    submission::SubmissionStatus,
    workflow::{NextAction, PriorAuthWorkflowResult, StepStatus, WorkflowStage, WorkflowTraceStep},
};

use crate::{
    payload::build_form_payload,
    traits::{
        ClinicalCoder, IntakeAgent, NecessityAssessor, PolicyRetriever, SubmissionAdapter,
        TraceObserver,
    },
};

/// Per-run options supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Approve submission when no explicit reviewer decision exists.
    pub auto_approve: bool,
    /// Explicit clinician decision. Overrides `auto_approve` when set.
    pub reviewer_approved: Option<bool>,
    /// Correlation id for logs. A fresh UUID is used when absent.
    pub run_id: Option<String>,
}

impl RunOptions {
    /// The approval value handed to the submission adapter.
    pub fn approval(&self) -> bool {
        self.reviewer_approved.unwrap_or(self.auto_approve)
    }
}

/// Drives one or many workflow runs over a fixed set of stage components.
///
/// The orchestrator holds no per-run state, so one instance can be shared
/// across worker threads behind an `Arc`.
pub struct Orchestrator {
    intake: Box<dyn IntakeAgent>,
    coder: Box<dyn ClinicalCoder>,
    retriever: Box<dyn PolicyRetriever>,
    assessor: Box<dyn NecessityAssessor>,
    submitter: Box<dyn SubmissionAdapter>,
}

impl Orchestrator {
    pub fn new(
        intake: Box<dyn IntakeAgent>,
        coder: Box<dyn ClinicalCoder>,
        retriever: Box<dyn PolicyRetriever>,
        assessor: Box<dyn NecessityAssessor>,
        submitter: Box<dyn SubmissionAdapter>,
    ) -> Self {
        Self {
            intake,
            coder,
            retriever,
            assessor,
            submitter,
        }
    }

    /// Execute the full stage sequence for `transcript`.
    ///
    /// `observer`, when given, is called synchronously with each trace step
    /// right after it is appended.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when a stage component itself returns one: the
    /// intake collaborator rejecting the transcript, or a coder/assessor
    /// configured for strict capability success. In that case the failing
    /// stage's `failed` step has already been delivered to the observer.
    /// A missing member id and a failed submission are NOT errors; they are
    /// terminal routing decisions on the returned result.
    pub fn run(
        &self,
        transcript: &str,
        options: &RunOptions,
        observer: Option<&dyn TraceObserver>,
    ) -> PriorAuthResult<PriorAuthWorkflowResult> {
        let run_id = options
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut trace = TraceRecorder::new(&run_id, observer);
        let mut result = PriorAuthWorkflowResult::default();

        info!(run_id = %run_id, auto_approve = options.auto_approve, "workflow run starting");

        // ── Stage 1: Voice Intake ────────────────────────────────────────────
        trace.record(WorkflowStage::VoiceIntake, StepStatus::InProgress, "Parsing clinician transcript.");
        let extracted = match self.intake.ingest(transcript) {
            Ok(extracted) => extracted,
            Err(e) => return trace.fail(WorkflowStage::VoiceIntake, e),
        };
        let patient = if extracted.patient_name.is_empty() {
            "unknown"
        } else {
            extracted.patient_name.as_str()
        };
        trace.record(
            WorkflowStage::VoiceIntake,
            StepStatus::Completed,
            format!("Patient={} Payer={}.", patient, extracted.payer_name),
        );
        result.extracted_data = Some(extracted.clone());

        // ── Stage 2: Eligibility Verification ────────────────────────────────
        //
        // The single early exit. Missing input is a routing outcome, not an error.
        trace.record(
            WorkflowStage::EligibilityVerification,
            StepStatus::InProgress,
            "Checking required identifiers.",
        );
        if extracted.member_id.trim().is_empty() {
            warn!(run_id = %run_id, "member id missing, stopping at eligibility");
            trace.record(
                WorkflowStage::EligibilityVerification,
                StepStatus::Failed,
                "Missing member ID from intake transcript.",
            );
            result.next_action = Some(NextAction::CollectMissingMemberId);
            result.trace = trace.into_steps();
            return Ok(result);
        }
        trace.record(
            WorkflowStage::EligibilityVerification,
            StepStatus::Completed,
            format!("Member ID {} is present.", extracted.member_id),
        );

        // ── Stage 3: Clinical Coding ─────────────────────────────────────────
        trace.record(WorkflowStage::ClinicalCoding, StepStatus::InProgress, "Mapping ICD-10 and CPT codes.");
        let coding = match self.coder.map_codes(&extracted) {
            Ok(coding) => coding,
            Err(e) => return trace.fail(WorkflowStage::ClinicalCoding, e),
        };
        trace.record(
            WorkflowStage::ClinicalCoding,
            StepStatus::Completed,
            format!(
                "Mapped diagnosis={}, procedure={}.",
                coding.diagnosis_code, coding.procedure_code
            ),
        );
        result.coding = Some(coding.clone());

        // ── Stage 4: Knowledge Retrieval ─────────────────────────────────────
        trace.record(
            WorkflowStage::KnowledgeRetrieval,
            StepStatus::InProgress,
            "Fetching payer policy criteria.",
        );
        let policy = self.retriever.retrieve(
            &extracted.payer_name,
            &extracted.member_id,
            &coding.procedure_code,
            &extracted.requested_service,
        );
        trace.record(
            WorkflowStage::KnowledgeRetrieval,
            StepStatus::Completed,
            format!("Selected policy {}.", policy.policy_id),
        );
        result.policy = Some(policy.clone());

        // ── Stage 5: Medical Necessity Analysis ──────────────────────────────
        trace.record(
            WorkflowStage::MedicalNecessityAnalysis,
            StepStatus::InProgress,
            "Evaluating policy criteria.",
        );
        let necessity = match self.assessor.evaluate_medical_necessity(&extracted, &coding, &policy) {
            Ok(necessity) => necessity,
            Err(e) => return trace.fail(WorkflowStage::MedicalNecessityAnalysis, e),
        };
        trace.record(
            WorkflowStage::MedicalNecessityAnalysis,
            StepStatus::Completed,
            format!(
                "meets_criteria={}, denial_risk={:.2}.",
                necessity.meets_criteria, necessity.denial_risk_score
            ),
        );
        result.necessity = Some(necessity.clone());

        // ── Stage 6: Form Population ─────────────────────────────────────────
        trace.record(
            WorkflowStage::FormPopulation,
            StepStatus::InProgress,
            "Building PA submission payload.",
        );
        let payload = build_form_payload(&extracted, &coding, &necessity, &policy);
        trace.record(
            WorkflowStage::FormPopulation,
            StepStatus::Completed,
            "Payload built for browser automation.",
        );

        // ── Stage 7: Human Review ────────────────────────────────────────────
        trace.record(WorkflowStage::HumanReview, StepStatus::InProgress, "Preparing approval snapshot.");
        let snapshot = self.submitter.generate_review_snapshot(&payload);
        let approved = options.approval();
        trace.record(
            WorkflowStage::HumanReview,
            StepStatus::Completed,
            format!("approved={}.", approved),
        );

        // ── Stage 8: Portal Submission ───────────────────────────────────────
        trace.record(
            WorkflowStage::PortalSubmission,
            StepStatus::InProgress,
            "Executing portal form submission.",
        );
        let submission = self.submitter.submit(&payload, approved, &snapshot);

        let (status, detail, next_action) = match submission.status {
            SubmissionStatus::Submitted => (
                StepStatus::Completed,
                format!("Submitted successfully with reference {}.", submission.reference_id),
                NextAction::NotifyClinician,
            ),
            SubmissionStatus::NeedsApproval => (
                StepStatus::Blocked,
                "Awaiting clinician approval before submission.".to_string(),
                NextAction::HumanReviewRequired,
            ),
            SubmissionStatus::Failed => (
                StepStatus::Failed,
                submission.message.clone(),
                NextAction::RetrySubmission,
            ),
        };
        trace.record(WorkflowStage::PortalSubmission, status, detail);

        result.submission = Some(submission);
        result.next_action = Some(next_action);
        result.trace = trace.into_steps();

        info!(run_id = %run_id, next_action = %next_action, "workflow run finished");
        Ok(result)
    }
}

// ── Trace recording ──────────────────────────────────────────────────────────

/// Append-only trace buffer that forwards each step to the observer.
struct TraceRecorder<'a> {
    run_id: &'a str,
    observer: Option<&'a dyn TraceObserver>,
    steps: Vec<WorkflowTraceStep>,
}

impl<'a> TraceRecorder<'a> {
    fn new(run_id: &'a str, observer: Option<&'a dyn TraceObserver>) -> Self {
        Self {
            run_id,
            observer,
            steps: Vec::new(),
        }
    }

    fn record(&mut self, stage: WorkflowStage, status: StepStatus, detail: impl Into<String>) {
        let step = WorkflowTraceStep::now(stage, status, detail);
        debug!(
            run_id = %self.run_id,
            stage = %step.stage,
            status = %step.status,
            detail = %step.detail,
            "trace step"
        );
        self.steps.push(step);
        if let (Some(observer), Some(step)) = (self.observer, self.steps.last()) {
            observer.on_step(step);
        }
    }

    /// Record a failed terminal step for `stage` and hand back `err`.
    fn fail<T>(&mut self, stage: WorkflowStage, err: PriorAuthError) -> PriorAuthResult<T> {
        warn!(run_id = %self.run_id, stage = %stage, error = %err, "stage failed");
        self.record(stage, StepStatus::Failed, err.to_string());
        Err(err)
    }

    fn into_steps(self) -> Vec<WorkflowTraceStep> {
        self.steps
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use priorauth_contracts::{
        clinical::ExtractedClinicalData,
        coding::CodingResult,
        error::{PriorAuthError, PriorAuthResult},
        necessity::NecessityDecision,
        policy::{PolicyCriterion, PolicyMatch, RetrievalSource},
        submission::{FormPayload, SubmissionResult, SubmissionStatus},
        workflow::{NextAction, StepStatus, WorkflowStage, WorkflowTraceStep},
    };

    use crate::traits::{
        ClinicalCoder, IntakeAgent, NecessityAssessor, PolicyRetriever, SubmissionAdapter,
    };

    use super::{Orchestrator, RunOptions};

    // ── Mock helpers ─────────────────────────────────────────────────────────

    fn sample_data(member_id: &str) -> ExtractedClinicalData {
        ExtractedClinicalData {
            patient_name: "Jane Doe".into(),
            member_id: member_id.into(),
            payer_name: "UnitedHealthcare".into(),
            requested_service: "MRI lumbar spine without contrast".into(),
            urgency: "routine".into(),
            ..Default::default()
        }
    }

    struct MockIntake {
        data: ExtractedClinicalData,
    }

    impl IntakeAgent for MockIntake {
        fn ingest(&self, transcript: &str) -> PriorAuthResult<ExtractedClinicalData> {
            Ok(ExtractedClinicalData {
                transcript: transcript.to_string(),
                ..self.data.clone()
            })
        }
    }

    /// A coder that counts calls and optionally fails as if in strict mode.
    struct MockCoder {
        calls: Arc<Mutex<u32>>,
        fail: bool,
    }

    impl ClinicalCoder for MockCoder {
        fn map_codes(&self, _extracted: &ExtractedClinicalData) -> PriorAuthResult<CodingResult> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(PriorAuthError::CapabilityFailed {
                    capability: "reasoning".into(),
                    reason: "throttled".into(),
                });
            }
            Ok(CodingResult {
                diagnosis_code: "M54.17".into(),
                procedure_code: "72148".into(),
                confidence: 0.92,
                rationale: "mock".into(),
                source: "heuristic".into(),
            })
        }
    }

    struct MockRetriever;

    impl PolicyRetriever for MockRetriever {
        fn retrieve(&self, payer: &str, _member: &str, _procedure: &str, _service: &str) -> PolicyMatch {
            PolicyMatch {
                policy_id: "UHC-LUMBAR-MRI-2026".into(),
                payer_name: payer.into(),
                title: "Lumbar Spine MRI Medical Necessity Policy".into(),
                criteria: vec![PolicyCriterion::new("clinical_indication", "Indication documented.")],
                minimum_criteria: 1,
                required_documents: vec!["progress_notes".into()],
                denial_patterns: vec![],
                source: RetrievalSource::Local,
            }
        }
    }

    struct MockAssessor;

    impl NecessityAssessor for MockAssessor {
        fn evaluate_medical_necessity(
            &self,
            _extracted: &ExtractedClinicalData,
            _coding: &CodingResult,
            _policy: &PolicyMatch,
        ) -> PriorAuthResult<NecessityDecision> {
            Ok(NecessityDecision {
                meets_criteria: true,
                satisfied_criteria: vec!["Indication documented.".into()],
                missing_criteria: vec![],
                missing_documents: vec![],
                denial_risk_score: 0.13,
                clinical_justification: "Justified.".into(),
                extended_reasoning_used: false,
            })
        }
    }

    /// An adapter that records every approval flag it receives.
    ///
    /// Approved payloads get `approved_status`; unapproved ones pause.
    struct MockAdapter {
        approved_status: SubmissionStatus,
        approvals: Arc<Mutex<Vec<bool>>>,
    }

    impl SubmissionAdapter for MockAdapter {
        fn generate_review_snapshot(&self, payload: &FormPayload) -> String {
            format!("snapshot for {}", payload["member_id"])
        }

        fn submit(&self, payload: &FormPayload, approved: bool, review_snapshot: &str) -> SubmissionResult {
            self.approvals.lock().unwrap().push(approved);
            let (status, reference, message) = match (approved, self.approved_status) {
                (false, _) => (SubmissionStatus::NeedsApproval, "", "Paused for human review"),
                (true, SubmissionStatus::Submitted) => (SubmissionStatus::Submitted, "PA-TEST1234", "ok"),
                (true, other) => (other, "", "portal unreachable"),
            };
            SubmissionResult {
                status,
                message: message.into(),
                reference_id: reference.into(),
                review_snapshot: review_snapshot.into(),
                payload: payload.clone(),
                mode: "mock".into(),
            }
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        coder_calls: Arc<Mutex<u32>>,
        approvals: Arc<Mutex<Vec<bool>>>,
    }

    fn harness(member_id: &str, approved_status: SubmissionStatus, coder_fails: bool) -> Harness {
        let coder_calls = Arc::new(Mutex::new(0));
        let approvals = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Orchestrator::new(
            Box::new(MockIntake { data: sample_data(member_id) }),
            Box::new(MockCoder { calls: coder_calls.clone(), fail: coder_fails }),
            Box::new(MockRetriever),
            Box::new(MockAssessor),
            Box::new(MockAdapter { approved_status, approvals: approvals.clone() }),
        );
        Harness { orchestrator, coder_calls, approvals }
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    /// Without approval the run pauses at submission and asks for review.
    #[test]
    fn test_unapproved_run_requires_human_review() {
        let h = harness("UHC-4429871", SubmissionStatus::Submitted, false);
        let result = h
            .orchestrator
            .run("transcript", &RunOptions::default(), None)
            .unwrap();

        assert_eq!(result.next_action, Some(NextAction::HumanReviewRequired));
        assert_eq!(result.trace.len(), 16, "eight stages, two steps each");

        let last = result.trace.last().unwrap();
        assert_eq!(last.stage, WorkflowStage::PortalSubmission);
        assert_eq!(last.status, StepStatus::Blocked);
        assert_eq!(last.detail, "Awaiting clinician approval before submission.");
        assert_eq!(
            result.submission.as_ref().map(|s| s.status),
            Some(SubmissionStatus::NeedsApproval)
        );
    }

    /// Every stage emits in_progress followed by one terminal step, in order.
    #[test]
    fn test_stage_sequence_is_linear() {
        let h = harness("UHC-4429871", SubmissionStatus::Submitted, false);
        let options = RunOptions { auto_approve: true, ..Default::default() };
        let result = h.orchestrator.run("transcript", &options, None).unwrap();

        for (idx, stage) in WorkflowStage::ALL.iter().enumerate() {
            let opening = &result.trace[idx * 2];
            let closing = &result.trace[idx * 2 + 1];
            assert_eq!(opening.stage, *stage);
            assert_eq!(opening.status, StepStatus::InProgress);
            assert_eq!(closing.stage, *stage);
            assert_ne!(closing.status, StepStatus::InProgress);
        }
    }

    #[test]
    fn test_auto_approved_submission_notifies_clinician() {
        let h = harness("UHC-4429871", SubmissionStatus::Submitted, false);
        let options = RunOptions { auto_approve: true, ..Default::default() };
        let result = h.orchestrator.run("transcript", &options, None).unwrap();

        assert_eq!(result.next_action, Some(NextAction::NotifyClinician));
        let submission = result.submission.unwrap();
        assert_eq!(submission.reference_id, "PA-TEST1234");
        assert_eq!(
            result.trace.last().unwrap().detail,
            "Submitted successfully with reference PA-TEST1234."
        );
    }

    /// An explicit reviewer decision wins over the auto-approve flag.
    #[test]
    fn test_reviewer_decision_overrides_auto_approve() {
        let h = harness("UHC-4429871", SubmissionStatus::Submitted, false);

        let denied = RunOptions { auto_approve: true, reviewer_approved: Some(false), run_id: None };
        let result = h.orchestrator.run("t", &denied, None).unwrap();
        assert_eq!(result.next_action, Some(NextAction::HumanReviewRequired));

        let granted = RunOptions { auto_approve: false, reviewer_approved: Some(true), run_id: None };
        let result = h.orchestrator.run("t", &granted, None).unwrap();
        assert_eq!(result.next_action, Some(NextAction::NotifyClinician));

        assert_eq!(*h.approvals.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn test_missing_member_id_stops_at_eligibility() {
        let h = harness("", SubmissionStatus::Submitted, false);
        let options = RunOptions { auto_approve: true, ..Default::default() };
        let result = h.orchestrator.run("transcript", &options, None).unwrap();

        assert_eq!(result.next_action, Some(NextAction::CollectMissingMemberId));
        assert_eq!(result.trace.len(), 4);
        let last = result.trace.last().unwrap();
        assert_eq!(last.stage, WorkflowStage::EligibilityVerification);
        assert_eq!(last.status, StepStatus::Failed);
        assert_eq!(last.detail, "Missing member ID from intake transcript.");

        assert!(result.extracted_data.is_some());
        assert!(result.coding.is_none());
        assert!(result.policy.is_none());
        assert!(result.necessity.is_none());
        assert!(result.submission.is_none());
        assert_eq!(*h.coder_calls.lock().unwrap(), 0, "coder must not run");
        assert!(h.approvals.lock().unwrap().is_empty(), "adapter must not run");
    }

    #[test]
    fn test_failed_submission_routes_to_retry() {
        let h = harness("UHC-4429871", SubmissionStatus::Failed, false);
        let options = RunOptions { auto_approve: true, ..Default::default() };
        let result = h.orchestrator.run("transcript", &options, None).unwrap();

        assert_eq!(result.next_action, Some(NextAction::RetrySubmission));
        let last = result.trace.last().unwrap();
        assert_eq!(last.status, StepStatus::Failed);
        assert_eq!(last.detail, "portal unreachable");
    }

    /// The observer sees exactly the steps that end up in the result, in order.
    #[test]
    fn test_observer_receives_every_step() {
        let h = harness("UHC-4429871", SubmissionStatus::Submitted, false);
        let seen: Arc<Mutex<Vec<WorkflowTraceStep>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = move |step: &WorkflowTraceStep| sink.lock().unwrap().push(step.clone());

        let result = h
            .orchestrator
            .run("transcript", &RunOptions::default(), Some(&observer))
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), result.trace);
    }

    /// A strict-mode coder failure propagates after the failed step is emitted.
    #[test]
    fn test_strict_coder_failure_propagates() {
        let h = harness("UHC-4429871", SubmissionStatus::Submitted, true);
        let seen: Arc<Mutex<Vec<WorkflowTraceStep>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = move |step: &WorkflowTraceStep| sink.lock().unwrap().push(step.clone());

        let err = h
            .orchestrator
            .run("transcript", &RunOptions::default(), Some(&observer))
            .unwrap_err();

        assert!(matches!(err, PriorAuthError::CapabilityFailed { .. }), "got {:?}", err);
        let seen = seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.stage, WorkflowStage::ClinicalCoding);
        assert_eq!(last.status, StepStatus::Failed);
        assert!(h.approvals.lock().unwrap().is_empty());
    }

    #[test]
    fn test_payload_reaches_adapter_with_policy_and_risk() {
        let h = harness("UHC-4429871", SubmissionStatus::Submitted, false);
        let options = RunOptions { auto_approve: true, ..Default::default() };
        let result = h.orchestrator.run("transcript", &options, None).unwrap();

        let submission = result.submission.unwrap();
        assert_eq!(submission.payload["policy_id"], "UHC-LUMBAR-MRI-2026");
        assert_eq!(submission.payload["denial_risk_score"], "0.13");
        assert_eq!(submission.review_snapshot, "snapshot for UHC-4429871");
    }
}
