//! # priorauth-runs
//!
//! The run registry that hosts workflow runs outside the pipeline.
//!
//! - `RunStore` keeps a bounded set of `RunRecord`s behind one lock and only
//!   ever hands out snapshots.
//! - `RunStore::subscribe` gives each observer its own event queue, kept
//!   alive with heartbeats while the run is idle.
//! - `spawn_run` executes a queued run on a worker thread; `approve_run`
//!   re-executes a run that stopped at human review.

pub mod event;
pub mod record;
pub mod store;
pub mod worker;

pub use event::{RunEvent, RunEventKind};
pub use record::{RunRecord, RunStatus, RunSummary};
pub use store::{codes, error_code, RunStore, RunSubscription};
pub use worker::{approve_run, execute_run, spawn_run};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use priorauth_contracts::{
        clinical::ExtractedClinicalData,
        error::{PriorAuthError, PriorAuthResult},
        submission::{FormPayload, SubmissionResult, SubmissionStatus},
        workflow::NextAction,
    };
    use priorauth_core::{
        orchestrator::Orchestrator,
        traits::{IntakeAgent, SubmissionAdapter},
    };
    use priorauth_policy::{PolicyMatcher, PolicyStore};
    use priorauth_reasoning::{CodingResolver, NecessityEvaluator};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Treats the transcript as the member id; rejects an empty transcript.
    struct MemberIdIntake;

    impl IntakeAgent for MemberIdIntake {
        fn ingest(&self, transcript: &str) -> PriorAuthResult<ExtractedClinicalData> {
            if transcript.is_empty() {
                return Err(PriorAuthError::Intake {
                    reason: "empty transcript".into(),
                });
            }
            Ok(ExtractedClinicalData {
                transcript: "Lumbar radiculopathy after six weeks of therapy.".into(),
                patient_name: "Jane Doe".into(),
                member_id: transcript.into(),
                payer_name: "UnitedHealthcare".into(),
                requested_service: "MRI lumbar spine without contrast".into(),
                conservative_therapy_weeks: Some(6),
                imaging_evidence: "confirmed on X-ray".into(),
                clinical_findings: vec!["Radiculopathy".into()],
                ..Default::default()
            })
        }
    }

    struct PortalStub;

    impl SubmissionAdapter for PortalStub {
        fn generate_review_snapshot(&self, payload: &FormPayload) -> String {
            format!("review {}", payload["member_id"])
        }

        fn submit(&self, payload: &FormPayload, approved: bool, review_snapshot: &str) -> SubmissionResult {
            let (status, reference) = if approved {
                (SubmissionStatus::Submitted, "PA-STUB0001")
            } else {
                (SubmissionStatus::NeedsApproval, "")
            };
            SubmissionResult {
                status,
                message: String::new(),
                reference_id: reference.into(),
                review_snapshot: review_snapshot.into(),
                payload: payload.clone(),
                mode: "stub".into(),
            }
        }
    }

    fn orchestrator() -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            Box::new(MemberIdIntake),
            Box::new(CodingResolver::heuristic_only()),
            Box::new(PolicyMatcher::local(Arc::new(PolicyStore::builtin()))),
            Box::new(NecessityEvaluator::deterministic()),
            Box::new(PortalStub),
        ))
    }

    fn code_of(err: &PriorAuthError) -> &str {
        error_code(err).unwrap_or("not a registry error")
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_run_ids_are_twelve_hex_chars() {
        let id = record::new_run_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_completed_run_summary() {
        let store = RunStore::default();
        let run = store.create_run("UHC-4429871", true, None).unwrap();
        assert_eq!(run.status, RunStatus::Queued);

        let done = execute_run(&store, &orchestrator(), &run.run_id).unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(done.trace.len(), 16);

        let summary = store.get(&run.run_id).unwrap().summary();
        assert_eq!(summary.coding_source.as_deref(), Some("heuristic"));
        assert_eq!(summary.diagnosis_code.as_deref(), Some("M54.17"));
        assert_eq!(summary.procedure_code.as_deref(), Some("72148"));
        assert_eq!(summary.submission_status, Some(SubmissionStatus::Submitted));
        assert_eq!(summary.reference_id.as_deref(), Some("PA-STUB0001"));
        assert_eq!(summary.next_action, Some(NextAction::NotifyClinician));
        assert_eq!(summary.trace_len, 16);
        assert!(summary.duration_ms.unwrap() >= 0);
        assert_eq!(summary.audit_hash.as_ref().map(String::len), Some(64));
        assert!(summary.denial_risk_score.unwrap() < 0.6);
    }

    #[test]
    fn test_intake_error_marks_run_failed() {
        let store = RunStore::default();
        let run = store.create_run("", true, None).unwrap();
        let done = execute_run(&store, &orchestrator(), &run.run_id).unwrap();
        assert_eq!(done.status, RunStatus::Failed);
        assert!(done.error.unwrap().contains("empty transcript"));
        assert_eq!(done.trace.len(), 2);
        assert!(done.result.is_none());
    }

    #[test]
    fn test_approval_reruns_with_reviewer_approval() {
        let store = Arc::new(RunStore::default());
        let orchestrator = orchestrator();
        let run = store.create_run("UHC-4429871", false, None).unwrap();
        let paused = execute_run(&store, &orchestrator, &run.run_id).unwrap();
        assert_eq!(paused.summary().submission_status, Some(SubmissionStatus::NeedsApproval));
        assert!(paused.awaiting_approval());

        approve_run(store.clone(), orchestrator, &run.run_id)
            .unwrap()
            .join()
            .unwrap();

        let approved = store.get(&run.run_id).unwrap();
        assert_eq!(approved.status, RunStatus::Completed);
        assert_eq!(approved.reviewer_approved, Some(true));
        assert_eq!(approved.summary().submission_status, Some(SubmissionStatus::Submitted));
    }

    #[test]
    fn test_approval_errors() {
        let store = RunStore::default();
        let err = store.prepare_approval("000000000000").unwrap_err();
        assert_eq!(code_of(&err), codes::RUN_NOT_FOUND);

        let queued = store.create_run("UHC-4429871", true, None).unwrap();
        let err = store.prepare_approval(&queued.run_id).unwrap_err();
        assert_eq!(code_of(&err), codes::RUN_NOT_WAITING_FOR_APPROVAL);

        store.mark_running(&queued.run_id).unwrap();
        let err = store.prepare_approval(&queued.run_id).unwrap_err();
        assert_eq!(code_of(&err), codes::RUN_IN_PROGRESS);

        let err = execute_run(&store, &orchestrator(), &queued.run_id).unwrap_err();
        assert_eq!(code_of(&err), codes::RUN_NOT_QUEUED);

        let done = store.create_run("UHC-4429871", true, None).unwrap();
        execute_run(&store, &orchestrator(), &done.run_id).unwrap();
        let err = store.prepare_approval(&done.run_id).unwrap_err();
        assert_eq!(code_of(&err), codes::RUN_NOT_WAITING_FOR_APPROVAL);
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let store = RunStore::new(3, RunStore::DEFAULT_HEARTBEAT);
        let ids: Vec<String> = (0..5)
            .map(|_| store.create_run("UHC-1", true, None).unwrap().run_id)
            .collect();
        assert_eq!(store.len(), 3);
        assert!(store.get(&ids[0]).is_err());
        assert!(store.get(&ids[1]).is_err());

        let listed: Vec<String> = store.summaries(100).unwrap().into_iter().map(|s| s.run_id).collect();
        assert_eq!(listed, vec![ids[4].clone(), ids[3].clone(), ids[2].clone()]);
        assert_eq!(store.summaries(1).unwrap()[0].run_id, ids[4]);
        assert_eq!(store.summaries(0).unwrap().len(), 1);
    }

    #[test]
    fn test_subscriber_sees_ordered_events() {
        let store = Arc::new(RunStore::default());
        let run = store.create_run("UHC-4429871", true, None).unwrap();
        let subscription = store.subscribe(&run.run_id).unwrap();

        let handle = spawn_run(store.clone(), orchestrator(), run.run_id.clone()).unwrap();
        let kinds: Vec<RunEventKind> = subscription
            .filter(|e| e.kind != RunEventKind::Heartbeat)
            .map(|e| e.kind)
            .collect();
        handle.join().unwrap();

        assert_eq!(&kinds[..2], &[RunEventKind::Snapshot, RunEventKind::RunStarted]);
        assert_eq!(&kinds[kinds.len() - 2..], &[RunEventKind::RunCompleted, RunEventKind::Terminal]);
        assert_eq!(kinds.iter().filter(|k| **k == RunEventKind::Trace).count(), 16);
    }

    #[test]
    fn test_trace_events_carry_growing_snapshots() {
        let store = RunStore::default();
        let run = store.create_run("UHC-4429871", true, None).unwrap();
        let subscription = store.subscribe(&run.run_id).unwrap();
        execute_run(&store, &orchestrator(), &run.run_id).unwrap();

        let lengths: Vec<usize> = subscription
            .filter(|e| e.kind == RunEventKind::Trace)
            .map(|e| e.run.unwrap().trace.len())
            .collect();
        assert_eq!(lengths, (1..=16).collect::<Vec<_>>());
    }

    #[test]
    fn test_idle_subscription_heartbeats() {
        let store = RunStore::new(10, Duration::from_millis(10));
        let run = store.create_run("UHC-4429871", true, None).unwrap();
        let mut subscription = store.subscribe(&run.run_id).unwrap();
        assert_eq!(subscription.next().unwrap().kind, RunEventKind::Snapshot);
        let event = subscription.next().unwrap();
        assert_eq!(event.kind, RunEventKind::Heartbeat);
        assert!(event.run.is_none());
        assert_eq!(event.run_id, run.run_id);
    }

    #[test]
    fn test_subscribing_to_finished_run_yields_terminal() {
        let store = RunStore::default();
        let run = store.create_run("UHC-4429871", true, None).unwrap();
        execute_run(&store, &orchestrator(), &run.run_id).unwrap();

        let events: Vec<RunEvent> = store.subscribe(&run.run_id).unwrap().collect();
        let kinds: Vec<RunEventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![RunEventKind::Snapshot, RunEventKind::Terminal]);
        assert_eq!(events[1].run.as_ref().unwrap().status, RunStatus::Completed);
    }

    #[test]
    fn test_dropped_subscriber_does_not_block_run() {
        let store = RunStore::default();
        let run = store.create_run("UHC-4429871", true, None).unwrap();
        drop(store.subscribe(&run.run_id).unwrap());
        let done = execute_run(&store, &orchestrator(), &run.run_id).unwrap();
        assert_eq!(done.status, RunStatus::Completed);
    }

    #[test]
    fn test_snapshots_are_independent() {
        let store = RunStore::default();
        let run = store.create_run("UHC-4429871", true, None).unwrap();
        let before = store.get(&run.run_id).unwrap();
        execute_run(&store, &orchestrator(), &run.run_id).unwrap();
        assert!(before.trace.is_empty());
        assert_eq!(before.status, RunStatus::Queued);
    }

    #[test]
    fn test_status_and_event_serialization() {
        assert_eq!(serde_json::to_value(RunStatus::Queued).unwrap(), "queued");
        assert_eq!(serde_json::to_value(RunEventKind::RunCompleted).unwrap(), "run_completed");
        let summary = RunRecord::new("t", false, None).summary();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["trace_len"], 0);
        assert!(json["duration_ms"].is_null());
    }
}
