//! Lenient parsing and strict validation of model coding output.
//!
//! Validation runs in three phases:
//!
//! 1. **Locate**: take the outermost `{ … }` span of the reply, so prose or
//!    code fences around the object are tolerated.
//! 2. **Structural**: validate the object against a JSON Schema with the
//!    `jsonschema` crate. All violations are collected into one message.
//! 3. **Semantic**: normalize the values and require each code to match its
//!    code-system pattern.
//!
//! Every failure is `PriorAuthError::MalformedOutput`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};
use tracing::warn;

use priorauth_contracts::error::{PriorAuthError, PriorAuthResult};

/// ICD-10-CM diagnosis code pattern.
pub static ICD10_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-TV-Z][0-9][0-9A-Z](\.[0-9A-Z]{1,4})?$").expect("ICD-10 regex is valid")
});

/// CPT procedure code pattern.
pub static CPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}$").expect("CPT regex is valid"));

/// Confidence used when the model omits one.
pub const DEFAULT_MODEL_CONFIDENCE: f64 = 0.5;

static CODING_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "required": ["diagnosis_code", "procedure_code"],
        "properties": {
            "diagnosis_code": { "type": "string", "minLength": 1 },
            "procedure_code": { "type": "string", "minLength": 1 },
            "confidence": { "type": ["number", "string"] },
            "rationale": { "type": "string" }
        }
    })
});

/// A validated model coding answer, before guardrails.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCoding {
    pub diagnosis_code: String,
    pub procedure_code: String,
    pub confidence: f64,
    pub rationale: String,
}

/// The outermost `{ … }` span of `text`, if any.
pub fn locate_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Upper-case and strip whitespace from a diagnosis code.
pub fn normalize_diagnosis(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Keep the first five digits of a procedure code.
pub fn normalize_procedure(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).take(5).collect()
}

fn normalize_confidence(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_MODEL_CONFIDENCE,
    }
}

fn malformed(reason: impl Into<String>) -> PriorAuthError {
    PriorAuthError::MalformedOutput { reason: reason.into() }
}

/// Parse and validate a model's coding reply.
pub fn parse_model_coding(text: &str) -> PriorAuthResult<ModelCoding> {
    // ── Phase 1: locate the object ───────────────────────────────────────────
    let object = locate_json_object(text).ok_or_else(|| malformed("no JSON object in model reply"))?;
    let value: Value = serde_json::from_str(object)
        .map_err(|e| malformed(format!("model reply is not valid JSON: {}", e)))?;

    // ── Phase 2: structural validation ───────────────────────────────────────
    let validator = jsonschema::validator_for(&CODING_SCHEMA)
        .map_err(|e| malformed(format!("coding schema failed to compile: {}", e)))?;
    let violations: Vec<String> = validator
        .iter_errors(&value)
        .map(|error| format!("JSON Schema violation at {}: {}", error.instance_path, error))
        .collect();
    if !violations.is_empty() {
        let summary = violations.join("; ");
        warn!(violations = %summary, "model coding failed structural validation");
        return Err(malformed(summary));
    }

    // ── Phase 3: normalization and code patterns ─────────────────────────────
    let field = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default();
    let diagnosis_code = normalize_diagnosis(field("diagnosis_code"));
    let procedure_code = normalize_procedure(field("procedure_code"));

    if !ICD10_RE.is_match(&diagnosis_code) {
        return Err(malformed(format!("diagnosis code '{}' is not ICD-10-CM", diagnosis_code)));
    }
    if !CPT_RE.is_match(&procedure_code) {
        return Err(malformed(format!("procedure code '{}' is not a 5-digit CPT code", procedure_code)));
    }

    Ok(ModelCoding {
        diagnosis_code,
        procedure_code,
        confidence: normalize_confidence(value.get("confidence")),
        rationale: field("rationale").trim().to_string(),
    })
}
