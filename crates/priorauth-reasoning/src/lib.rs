//! # priorauth-reasoning
//!
//! Clinical coding and medical-necessity decisions.
//!
//! ## Coding
//!
//! `CodingResolver` runs an ordered strategy list (model, then heuristic),
//! validates model output in `model_output`, and always finishes with the
//! `guardrail` pass, which constrains codes to what the clinical signal can
//! support.
//!
//! ## Necessity
//!
//! `NecessityEvaluator` evaluates each policy criterion with a fixed
//! predicate, infers which documents are on file, scores denial risk, and
//! asks `Justifier` for a narrative (extended request → plain request →
//! template).

pub mod coding;
pub mod guardrail;
pub mod heuristic;
pub mod justification;
pub mod model_output;
pub mod necessity;

pub use coding::{CodingResolver, CodingSettings, CodingStrategy};
pub use justification::{Justifier, JustificationSettings};
pub use necessity::NecessityEvaluator;

// ── Tests ─────────────────────────────────────────────────────────────────────
