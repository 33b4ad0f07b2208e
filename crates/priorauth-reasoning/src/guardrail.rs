//! Context-derived allowed code sets and the guardrail pass.
//!
//! The guardrail runs after every coding path. It derives the diagnosis and
//! procedure codes the clinical signal can support, and replaces any code
//! outside that set with the set's preferred code. A substitution lowers
//! confidence by 5%, appends a note to the rationale, and suffixes the
//! provenance tag with `_guardrailed`.
//!
//! Applying the pass to its own output changes nothing.

use priorauth_contracts::coding::{provenance, CodingResult};

use crate::heuristic::has_token;

/// Confidence multiplier applied once when any code is substituted.
pub const GUARDRAIL_CONFIDENCE_FACTOR: f64 = 0.95;

/// Codes the signal supports. `preferred` is the substitute for an
/// out-of-set code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllowedCodes {
    pub codes: Vec<&'static str>,
    pub preferred: Option<&'static str>,
}

impl AllowedCodes {
    fn add(&mut self, codes: &[&'static str], preferred: &'static str) {
        for code in codes {
            if !self.codes.contains(code) {
                self.codes.push(code);
            }
        }
        self.preferred.get_or_insert(preferred);
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| *c == code)
    }
}

/// Allowed diagnosis codes for `signal`. Never empty.
pub fn allowed_diagnoses(signal: &str) -> AllowedCodes {
    let lumbar = signal.contains("lumbar");
    let radicular = ["radiculopathy", "radicular", "sciatica"]
        .iter()
        .any(|term| signal.contains(term));

    let mut allowed = AllowedCodes::default();
    if lumbar && radicular {
        allowed.add(&["M54.16", "M54.17"], "M54.17");
    }
    if lumbar && signal.contains("herniation") {
        allowed.add(&["M51.26"], "M51.26");
    }
    if signal.contains("back pain") {
        allowed.add(&["M54.50"], "M54.50");
    }
    if allowed.is_empty() {
        allowed.add(&["R52"], "R52");
    }
    allowed
}

fn contrast_variant(signal: &str, without: &'static str, with: &'static str, both: &'static str) -> &'static str {
    if signal.contains("without and with contrast") {
        both
    } else if signal.contains("with contrast") {
        with
    } else {
        without
    }
}

/// Allowed procedure codes for `signal`.
///
/// Empty when no lumbar imaging modality is named; an empty set leaves the
/// procedure code untouched. MRI takes priority over CT.
pub fn allowed_procedures(signal: &str) -> AllowedCodes {
    let lumbar = signal.contains("lumbar");
    let mut allowed = AllowedCodes::default();
    if !lumbar {
        return allowed;
    }
    if signal.contains("mri") || signal.contains("magnetic resonance") {
        let preferred = contrast_variant(signal, "72148", "72149", "72158");
        allowed.add(&["72148", "72149", "72158"], preferred);
    } else if has_token(signal, "ct") || signal.contains("computed tomography") {
        let preferred = contrast_variant(signal, "72131", "72132", "72133");
        allowed.add(&["72131", "72132", "72133"], preferred);
    }
    allowed
}

/// Constrain `coding` to the codes `signal` supports.
pub fn apply_guardrails(mut coding: CodingResult, signal: &str) -> CodingResult {
    let mut adjustments = Vec::new();

    let diagnoses = allowed_diagnoses(signal);
    if !diagnoses.contains(&coding.diagnosis_code) {
        if let Some(preferred) = diagnoses.preferred {
            adjustments.push(format!("diagnosis {} -> {}", coding.diagnosis_code, preferred));
            coding.diagnosis_code = preferred.to_string();
        }
    }

    let procedures = allowed_procedures(signal);
    if !procedures.is_empty() && !procedures.contains(&coding.procedure_code) {
        if let Some(preferred) = procedures.preferred {
            adjustments.push(format!("procedure {} -> {}", coding.procedure_code, preferred));
            coding.procedure_code = preferred.to_string();
        }
    }

    if adjustments.is_empty() {
        return coding;
    }

    coding.confidence = (coding.confidence * GUARDRAIL_CONFIDENCE_FACTOR).clamp(0.0, 1.0);
    let note = format!("Guardrail adjustments: {}.", adjustments.join("; "));
    coding.rationale = if coding.rationale.trim().is_empty() {
        note
    } else {
        format!("{} {}", coding.rationale.trim_end(), note)
    };
    if !coding.source.ends_with(provenance::GUARDRAILED_SUFFIX) {
        coding.source.push_str(provenance::GUARDRAILED_SUFFIX);
    }
    coding
}
