//! Hashing and chain verification.
//!
//! Hash input, in order: run id bytes, sequence as 8 little-endian bytes,
//! prev_hash bytes, compact JSON of the step.

use sha2::{Digest, Sha256};

use priorauth_contracts::workflow::WorkflowTraceStep;

use crate::event::TraceEvent;

/// Lowercase hex SHA-256 of one event's content.
///
/// # Panics
///
/// If `step` fails to serialize, which `WorkflowTraceStep` never does.
pub fn hash_step(run_id: &str, sequence: u64, step: &WorkflowTraceStep, prev_hash: &str) -> String {
    let step_json = serde_json::to_vec(step).expect("trace step serializes to JSON");

    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&step_json);
    hex::encode(hasher.finalize())
}

/// True when every event links to its predecessor and its stored hash
/// matches a recomputation. An empty chain is valid.
pub fn verify_chain(events: &[TraceEvent]) -> bool {
    let mut expected_prev = TraceEvent::GENESIS_HASH;
    for (idx, event) in events.iter().enumerate() {
        if event.sequence != idx as u64 || event.prev_hash != expected_prev {
            return false;
        }
        let recomputed = hash_step(&event.run_id, event.sequence, &event.step, &event.prev_hash);
        if event.this_hash != recomputed {
            return false;
        }
        expected_prev = &event.this_hash;
    }
    true
}
