//! `RunStore`: the shared, lock-guarded run registry.
//!
//! All state (records, insertion order, subscriber queues) sits behind one
//! `Mutex`. Events are published while the lock is held, so every subscriber
//! sees them in the order the record changed.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use priorauth_contracts::{
    error::{PriorAuthError, PriorAuthResult},
    workflow::{PriorAuthWorkflowResult, WorkflowTraceStep},
};
use priorauth_core::config::RunsConfig;

use crate::{
    event::{RunEvent, RunEventKind},
    record::{RunRecord, RunStatus, RunSummary},
};

/// Stable error codes carried in `PriorAuthError::RunRegistry` reasons.
pub mod codes {
    pub const RUN_NOT_FOUND: &str = "run_not_found";
    pub const RUN_IN_PROGRESS: &str = "run_in_progress";
    pub const RUN_NOT_WAITING_FOR_APPROVAL: &str = "run_not_waiting_for_approval";
    pub const RUN_NOT_QUEUED: &str = "run_not_queued";
}

pub(crate) fn registry_error(code: &str, run_id: &str) -> PriorAuthError {
    PriorAuthError::RunRegistry {
        reason: format!("{}: {}", code, run_id),
    }
}

/// The code of a `RunRegistry` error, if `err` is one.
pub fn error_code(err: &PriorAuthError) -> Option<&str> {
    match err {
        PriorAuthError::RunRegistry { reason } => reason.split(':').next(),
        _ => None,
    }
}

#[derive(Default)]
struct StoreState {
    runs: HashMap<String, RunRecord>,
    order: VecDeque<String>,
    listeners: HashMap<String, Vec<Sender<RunEvent>>>,
}

impl StoreState {
    fn record_mut(&mut self, run_id: &str) -> PriorAuthResult<&mut RunRecord> {
        self.runs
            .get_mut(run_id)
            .ok_or_else(|| registry_error(codes::RUN_NOT_FOUND, run_id))
    }

    /// Send an event built from the current record to every subscriber of
    /// `run_id`, dropping subscribers that have gone away.
    fn publish(&mut self, run_id: &str, kind: RunEventKind, step: Option<&WorkflowTraceStep>) {
        let Some(record) = self.runs.get(run_id) else {
            return;
        };
        let Some(listeners) = self.listeners.get_mut(run_id) else {
            return;
        };
        let event = RunEvent::new(kind, record, step);
        let before = listeners.len();
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
        if listeners.len() < before {
            debug!(run_id = %run_id, pruned = before - listeners.len(), "pruned disconnected subscribers");
        }
    }
}

/// Bounded, thread-safe registry of workflow runs.
pub struct RunStore {
    state: Mutex<StoreState>,
    max_runs: usize,
    heartbeat: Duration,
}

impl RunStore {
    pub const DEFAULT_MAX_RUNS: usize = 100;
    pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(20);

    pub fn new(max_runs: usize, heartbeat: Duration) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            max_runs: max_runs.max(1),
            heartbeat,
        }
    }

    pub fn from_config(config: &RunsConfig) -> Self {
        Self::new(config.max_runs, Duration::from_secs(config.heartbeat_secs))
    }

    fn lock(&self) -> PriorAuthResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|e| PriorAuthError::RunRegistry {
            reason: format!("run registry lock poisoned: {}", e),
        })
    }

    /// Register a queued run and publish `run_queued`.
    ///
    /// Evicts the oldest runs, with their subscribers, beyond the retention
    /// bound.
    pub fn create_run(
        &self,
        transcript: &str,
        auto_approve: bool,
        reviewer_approved: Option<bool>,
    ) -> PriorAuthResult<RunRecord> {
        let record = RunRecord::new(transcript, auto_approve, reviewer_approved);
        let run_id = record.run_id.clone();

        let mut state = self.lock()?;
        state.runs.insert(run_id.clone(), record.clone());
        state.order.push_back(run_id.clone());
        while state.order.len() > self.max_runs {
            if let Some(evicted) = state.order.pop_front() {
                state.runs.remove(&evicted);
                state.listeners.remove(&evicted);
                debug!(run_id = %evicted, "evicted run from registry");
            }
        }
        state.publish(&run_id, RunEventKind::RunQueued, None);

        info!(run_id = %run_id, auto_approve, "run queued");
        Ok(record)
    }

    /// Snapshot of one run.
    pub fn get(&self, run_id: &str) -> PriorAuthResult<RunRecord> {
        let state = self.lock()?;
        state
            .runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| registry_error(codes::RUN_NOT_FOUND, run_id))
    }

    /// Summaries of the `limit` most recent runs, newest first.
    pub fn summaries(&self, limit: usize) -> PriorAuthResult<Vec<RunSummary>> {
        let state = self.lock()?;
        Ok(state
            .order
            .iter()
            .rev()
            .take(limit.clamp(1, self.max_runs))
            .filter_map(|id| state.runs.get(id))
            .map(RunRecord::summary)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.runs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open an event queue for `run_id`.
    ///
    /// The queue starts with a `snapshot` event. A run that has already
    /// finished follows it with `terminal` and nothing else.
    pub fn subscribe(&self, run_id: &str) -> PriorAuthResult<RunSubscription> {
        let (tx, rx) = mpsc::channel();
        let mut state = self.lock()?;
        let record = state
            .runs
            .get(run_id)
            .ok_or_else(|| registry_error(codes::RUN_NOT_FOUND, run_id))?;

        // The receiver is alive, so these sends cannot fail.
        let _ = tx.send(RunEvent::new(RunEventKind::Snapshot, record, None));
        if record.status.is_terminal() {
            let _ = tx.send(RunEvent::new(RunEventKind::Terminal, record, None));
        } else {
            state.listeners.entry(run_id.to_string()).or_default().push(tx);
        }

        Ok(RunSubscription {
            run_id: run_id.to_string(),
            receiver: rx,
            heartbeat: self.heartbeat,
            finished: false,
        })
    }

    pub(crate) fn mark_running(&self, run_id: &str) -> PriorAuthResult<RunRecord> {
        let mut state = self.lock()?;
        let record = state.record_mut(run_id)?;
        if record.status != RunStatus::Queued {
            return Err(registry_error(codes::RUN_NOT_QUEUED, run_id));
        }
        record.status = RunStatus::Running;
        record.started_at = Some(Utc::now());
        let snapshot = record.clone();
        state.publish(run_id, RunEventKind::RunStarted, None);
        Ok(snapshot)
    }

    pub(crate) fn append_trace(&self, run_id: &str, step: &WorkflowTraceStep) {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "trace step dropped");
                return;
            }
        };
        match state.runs.get_mut(run_id) {
            Some(record) => record.trace.push(step.clone()),
            None => {
                debug!(run_id = %run_id, "trace step for evicted run ignored");
                return;
            }
        }
        state.publish(run_id, RunEventKind::Trace, Some(step));
    }

    /// Store the outcome, publish `run_completed`/`run_failed` then
    /// `terminal`, and release the run's subscribers.
    pub(crate) fn finish(
        &self,
        run_id: &str,
        outcome: PriorAuthResult<PriorAuthWorkflowResult>,
        audit_hash: Option<String>,
    ) -> PriorAuthResult<RunRecord> {
        let mut state = self.lock()?;
        let record = state.record_mut(run_id)?;
        record.finished_at = Some(Utc::now());
        record.audit_hash = audit_hash;

        let kind = match outcome {
            Ok(result) => {
                record.status = RunStatus::Completed;
                record.trace = result.trace.clone();
                record.result = Some(result);
                RunEventKind::RunCompleted
            }
            Err(e) => {
                record.status = RunStatus::Failed;
                record.error = Some(e.to_string());
                RunEventKind::RunFailed
            }
        };
        let snapshot = record.clone();

        state.publish(run_id, kind, None);
        state.publish(run_id, RunEventKind::Terminal, None);
        state.listeners.remove(run_id);

        info!(run_id = %run_id, status = ?snapshot.status, "run finished");
        Ok(snapshot)
    }

    /// Reset a run blocked at human review so it can be re-executed with
    /// `reviewer_approved = true`.
    ///
    /// # Errors
    ///
    /// `run_not_found`, `run_in_progress`, or `run_not_waiting_for_approval`.
    pub fn prepare_approval(&self, run_id: &str) -> PriorAuthResult<RunRecord> {
        let mut state = self.lock()?;
        let record = state.record_mut(run_id)?;
        if record.status == RunStatus::Running {
            return Err(registry_error(codes::RUN_IN_PROGRESS, run_id));
        }
        if !record.awaiting_approval() {
            return Err(registry_error(codes::RUN_NOT_WAITING_FOR_APPROVAL, run_id));
        }

        record.status = RunStatus::Queued;
        record.reviewer_approved = Some(true);
        record.result = None;
        record.error = None;
        record.audit_hash = None;
        record.trace.clear();
        record.started_at = None;
        record.finished_at = None;
        let snapshot = record.clone();
        state.publish(run_id, RunEventKind::RunQueued, None);

        info!(run_id = %run_id, "run approved and requeued");
        Ok(snapshot)
    }
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RUNS, Self::DEFAULT_HEARTBEAT)
    }
}

/// One subscriber's event queue.
///
/// Iterating yields events until `terminal`, substituting a `heartbeat`
/// whenever the queue stays empty for the heartbeat interval. Iteration also
/// ends if the run is evicted.
pub struct RunSubscription {
    run_id: String,
    receiver: Receiver<RunEvent>,
    heartbeat: Duration,
    finished: bool,
}

impl RunSubscription {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl Iterator for RunSubscription {
    type Item = RunEvent;

    fn next(&mut self) -> Option<RunEvent> {
        if self.finished {
            return None;
        }
        match self.receiver.recv_timeout(self.heartbeat) {
            Ok(event) => {
                self.finished = event.kind == RunEventKind::Terminal;
                Some(event)
            }
            Err(RecvTimeoutError::Timeout) => Some(RunEvent::heartbeat(&self.run_id)),
            Err(RecvTimeoutError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }
}
