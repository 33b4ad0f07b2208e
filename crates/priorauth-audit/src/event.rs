//! Trace events and the exported log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use priorauth_contracts::workflow::WorkflowTraceStep;

/// One trace step, linked to its predecessor by hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    pub run_id: String,
    pub step: WorkflowTraceStep,
    /// `this_hash` of the previous event, or `GENESIS_HASH` for the first.
    pub prev_hash: String,
    pub this_hash: String,
}

impl TraceEvent {
    /// `prev_hash` of the first event in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed copy of one run's chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLog {
    pub run_id: String,
    pub events: Vec<TraceEvent>,
    pub exported_at: DateTime<Utc>,
    /// `this_hash` of the last event; empty when there are no events.
    pub terminal_hash: String,
}
