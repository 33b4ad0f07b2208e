//! `InMemoryTraceAudit`: a trace observer that hash-chains every step.

use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, warn};

use priorauth_contracts::workflow::WorkflowTraceStep;
use priorauth_core::traits::TraceObserver;

use crate::{
    chain::{hash_step, verify_chain},
    event::{TraceEvent, TraceLog},
};

pub(crate) struct ChainState {
    pub(crate) events: Vec<TraceEvent>,
    pub(crate) last_hash: String,
}

/// Append-only audit chain for one run.
///
/// Pass it as the orchestrator's observer; each step is chained as it is
/// appended to the trace.
pub struct InMemoryTraceAudit {
    run_id: String,
    pub(crate) state: Mutex<ChainState>,
}

impl InMemoryTraceAudit {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: Mutex::new(ChainState {
                events: Vec::new(),
                last_hash: TraceEvent::GENESIS_HASH.to_string(),
            }),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Append one step and return its hash.
    pub fn append(&self, step: &WorkflowTraceStep) -> Option<String> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!(run_id = %self.run_id, error = %e, "trace audit lock poisoned, step not chained");
                return None;
            }
        };
        let sequence = state.events.len() as u64;
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_step(&self.run_id, sequence, step, &prev_hash);

        debug!(run_id = %self.run_id, sequence, stage = %step.stage, "trace step chained");
        state.events.push(TraceEvent {
            sequence,
            run_id: self.run_id.clone(),
            step: step.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.last_hash = this_hash.clone();
        Some(this_hash)
    }

    /// A sealed copy of the chain so far.
    pub fn export_log(&self) -> TraceLog {
        let events = match self.state.lock() {
            Ok(state) => state.events.clone(),
            Err(poisoned) => poisoned.into_inner().events.clone(),
        };
        let terminal_hash = events.last().map(|e| e.this_hash.clone()).unwrap_or_default();
        TraceLog {
            run_id: self.run_id.clone(),
            events,
            exported_at: Utc::now(),
            terminal_hash,
        }
    }

    pub fn verify_integrity(&self) -> bool {
        match self.state.lock() {
            Ok(state) => verify_chain(&state.events),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TraceObserver for InMemoryTraceAudit {
    fn on_step(&self, step: &WorkflowTraceStep) {
        self.append(step);
    }
}
