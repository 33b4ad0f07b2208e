//! # priorauth-audit
//!
//! Tamper-evident record of a run's workflow trace.
//!
//! `InMemoryTraceAudit` is a `TraceObserver`: hand it to
//! `Orchestrator::run` and every trace step is wrapped in a `TraceEvent`
//! whose SHA-256 hash commits to the step and to the previous event. Editing
//! any stored step breaks the chain, which `verify_integrity` detects.
//!
//! ```rust,ignore
//! let audit = InMemoryTraceAudit::new(&run_id);
//! let result = orchestrator.run(transcript, &options, Some(&audit))?;
//! assert!(audit.verify_integrity());
//! let log = audit.export_log();
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_step, verify_chain};
pub use event::{TraceEvent, TraceLog};
pub use memory::InMemoryTraceAudit;

// ── Tests ─────────────────────────────────────────────────────────────────────
