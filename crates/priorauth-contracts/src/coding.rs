//! Diagnosis and procedure coding results.

use serde::{Deserialize, Serialize};

/// Provenance tags carried on `CodingResult::source`.
///
/// The tag is an open string so composite tags such as `nova_guardrailed`
/// survive serialization unchanged; these constants name the building blocks.
pub mod provenance {
    /// Deterministic keyword decision table.
    pub const HEURISTIC: &str = "heuristic";
    /// External reasoning model.
    pub const MODEL: &str = "nova";
    /// Heuristic used after the model path failed.
    pub const HEURISTIC_FALLBACK: &str = "heuristic_fallback";
    /// Appended when the guardrail pass substituted a code.
    pub const GUARDRAILED_SUFFIX: &str = "_guardrailed";
}

/// The codes chosen for one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingResult {
    /// ICD-10-CM diagnosis code, e.g. `M54.17`.
    pub diagnosis_code: String,
    /// Five-digit CPT procedure code, e.g. `72148`.
    pub procedure_code: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub rationale: String,
    /// Provenance tag; see [`provenance`].
    pub source: String,
}

impl CodingResult {
    pub fn is_guardrailed(&self) -> bool {
        self.source.contains("guardrailed")
    }

    pub fn is_fallback(&self) -> bool {
        self.source.contains("fallback")
    }
}
