//! Deterministic keyword coding.
//!
//! Two ordered decision tables over the lower-cased coding signal
//! (`transcript + findings + requested service`). The first matching branch
//! wins; there is no scoring.

use priorauth_contracts::coding::{provenance, CodingResult};

/// A resolved diagnosis branch: code, confidence, rationale fragment.
struct DiagnosisBranch {
    code: &'static str,
    confidence: f64,
    rationale: &'static str,
}

struct ProcedureBranch {
    code: &'static str,
    rationale: &'static str,
}

/// True when `signal` contains `word` as a standalone alphanumeric token.
///
/// Used for short tokens such as `ct` that would otherwise match inside
/// unrelated words.
pub(crate) fn has_token(signal: &str, word: &str) -> bool {
    signal
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == word)
}

fn diagnosis_branch(signal: &str) -> DiagnosisBranch {
    let lumbar = signal.contains("lumbar");
    if signal.contains("radiculopathy") && lumbar {
        DiagnosisBranch {
            code: "M54.17",
            confidence: 0.92,
            rationale: "Lumbar/lumbosacral radiculopathy identified from findings.",
        }
    } else if signal.contains("disc herniation") && lumbar {
        DiagnosisBranch {
            code: "M51.26",
            confidence: 0.88,
            rationale: "Lumbar disc displacement inferred from herniation finding.",
        }
    } else if signal.contains("back pain") {
        DiagnosisBranch {
            code: "M54.50",
            confidence: 0.80,
            rationale: "Low back pain identified from transcript.",
        }
    } else {
        DiagnosisBranch {
            code: "R52",
            confidence: 0.55,
            rationale: "Unspecified pain fallback due to limited diagnostic context.",
        }
    }
}

fn procedure_branch(signal: &str) -> ProcedureBranch {
    if signal.contains("without and with contrast") {
        ProcedureBranch {
            code: "72158",
            rationale: "MRI lumbar spine without/with contrast inferred from requested service.",
        }
    } else if signal.contains("with contrast") {
        ProcedureBranch {
            code: "72149",
            rationale: "MRI lumbar spine with contrast inferred from requested service.",
        }
    } else if has_token(signal, "ct") && signal.contains("lumbar") {
        ProcedureBranch {
            code: "72131",
            rationale: "CT lumbar spine inferred from requested service.",
        }
    } else {
        ProcedureBranch {
            code: "72148",
            rationale: "MRI lumbar spine without contrast inferred from requested service.",
        }
    }
}

/// Code `signal` with the fixed decision tables.
///
/// The result is tagged `heuristic` and has not been through the guardrail
/// pass yet.
pub fn heuristic_coding(signal: &str) -> CodingResult {
    let diagnosis = diagnosis_branch(signal);
    let procedure = procedure_branch(signal);
    CodingResult {
        diagnosis_code: diagnosis.code.to_string(),
        procedure_code: procedure.code.to_string(),
        confidence: diagnosis.confidence,
        rationale: format!("{} {}", diagnosis.rationale, procedure.rationale),
        source: provenance::HEURISTIC.to_string(),
    }
}
