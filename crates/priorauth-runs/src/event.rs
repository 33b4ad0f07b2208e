//! Events delivered to run subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use priorauth_contracts::workflow::WorkflowTraceStep;

use crate::record::RunRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventKind {
    /// First event of every subscription: the record as it stood.
    Snapshot,
    RunQueued,
    RunStarted,
    Trace,
    RunCompleted,
    RunFailed,
    /// Last event of a run; the subscription ends after it.
    Terminal,
    /// Keep-alive sent when nothing else arrived within the interval.
    Heartbeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub kind: RunEventKind,
    pub run_id: String,
    pub at: DateTime<Utc>,
    /// Snapshot of the record at publish time. `None` for heartbeats.
    pub run: Option<RunRecord>,
    /// The appended step, for `trace` events.
    pub step: Option<WorkflowTraceStep>,
}

impl RunEvent {
    pub(crate) fn new(kind: RunEventKind, record: &RunRecord, step: Option<&WorkflowTraceStep>) -> Self {
        Self {
            kind,
            run_id: record.run_id.clone(),
            at: Utc::now(),
            run: Some(record.clone()),
            step: step.cloned(),
        }
    }

    pub fn heartbeat(run_id: &str) -> Self {
        Self {
            kind: RunEventKind::Heartbeat,
            run_id: run_id.to_string(),
            at: Utc::now(),
            run: None,
            step: None,
        }
    }
}
