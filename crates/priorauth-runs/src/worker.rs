//! Run execution on worker threads.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, warn};

use priorauth_audit::InMemoryTraceAudit;
use priorauth_contracts::{
    error::{PriorAuthError, PriorAuthResult},
    workflow::WorkflowTraceStep,
};
use priorauth_core::{orchestrator::Orchestrator, traits::TraceObserver};

use crate::{record::RunRecord, store::RunStore};

/// Execute a queued run on the current thread.
///
/// Each trace step is chained into an audit log and appended to the record
/// as it is emitted. A pipeline error marks the run `failed`; only registry
/// errors are returned.
pub fn execute_run(store: &RunStore, orchestrator: &Orchestrator, run_id: &str) -> PriorAuthResult<RunRecord> {
    let record = store.mark_running(run_id)?;
    let audit = InMemoryTraceAudit::new(run_id);
    let observer = |step: &WorkflowTraceStep| {
        audit.on_step(step);
        store.append_trace(run_id, step);
    };

    let outcome = orchestrator.run(&record.transcript, &record.run_options(), Some(&observer));

    if !audit.verify_integrity() {
        warn!(run_id = %run_id, "trace audit chain failed verification");
    }
    let log = audit.export_log();
    let audit_hash = (!log.terminal_hash.is_empty()).then_some(log.terminal_hash);
    store.finish(run_id, outcome, audit_hash)
}

/// Execute `run_id` on a dedicated thread.
pub fn spawn_run(
    store: Arc<RunStore>,
    orchestrator: Arc<Orchestrator>,
    run_id: String,
) -> PriorAuthResult<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("priorauth-run-{}", run_id))
        .spawn(move || {
            if let Err(e) = execute_run(&store, &orchestrator, &run_id) {
                error!(run_id = %run_id, error = %e, "run could not be executed");
            }
        })
        .map_err(|e| PriorAuthError::RunRegistry {
            reason: format!("failed to spawn run worker: {}", e),
        })
}

/// Approve a run waiting at human review and re-execute it.
pub fn approve_run(
    store: Arc<RunStore>,
    orchestrator: Arc<Orchestrator>,
    run_id: &str,
) -> PriorAuthResult<JoinHandle<()>> {
    store.prepare_approval(run_id)?;
    spawn_run(store, orchestrator, run_id.to_string())
}
