//! The coding resolver: model coding with heuristic fallback and guardrails.
//!
//! Strategies run in a fixed order, `[Model, Heuristic]` when a reasoning
//! backend is configured and `[Heuristic]` otherwise. The first strategy to
//! produce a result wins. A failed model attempt is fatal in strict mode;
//! otherwise its failure class is carried into the heuristic rationale and
//! the result is tagged `heuristic_fallback`. Every result goes through the
//! guardrail pass before it is returned.

use std::sync::Arc;

use tracing::{debug, info, warn};

use priorauth_contracts::{
    capability::ReasoningRequest,
    clinical::ExtractedClinicalData,
    coding::{provenance, CodingResult},
    error::{PriorAuthError, PriorAuthResult},
};
use priorauth_core::{
    config::CodingConfig,
    traits::{ClinicalCoder, ReasoningBackend},
};

use crate::{
    guardrail::apply_guardrails,
    heuristic::heuristic_coding,
    model_output::parse_model_coding,
};

const CODING_SYSTEM_PROMPT: &str = "You are a clinical coding assistant for prior authorization. \
Return only a JSON object with keys diagnosis_code (ICD-10-CM), procedure_code (5-digit CPT), \
confidence (number between 0 and 1), and rationale (one sentence).";

/// One way of producing codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingStrategy {
    Model,
    Heuristic,
}

/// Model request parameters for coding.
#[derive(Debug, Clone, PartialEq)]
pub struct CodingSettings {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Propagate model failures instead of falling back.
    pub require_success: bool,
}

impl From<&CodingConfig> for CodingSettings {
    fn from(config: &CodingConfig) -> Self {
        Self {
            model_id: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            require_success: config.require_success,
        }
    }
}

/// `ClinicalCoder` implementation.
pub struct CodingResolver {
    backend: Option<Arc<dyn ReasoningBackend>>,
    settings: CodingSettings,
    strategies: Vec<CodingStrategy>,
}

impl CodingResolver {
    /// A resolver that only uses the heuristic tables.
    pub fn heuristic_only() -> Self {
        Self {
            backend: None,
            settings: CodingSettings::from(&CodingConfig::default()),
            strategies: vec![CodingStrategy::Heuristic],
        }
    }

    /// A resolver that asks `backend` first.
    pub fn with_model(backend: Arc<dyn ReasoningBackend>, settings: CodingSettings) -> Self {
        Self {
            backend: Some(backend),
            settings,
            strategies: vec![CodingStrategy::Model, CodingStrategy::Heuristic],
        }
    }

    pub fn strategies(&self) -> &[CodingStrategy] {
        &self.strategies
    }

    fn build_request(&self, extracted: &ExtractedClinicalData) -> ReasoningRequest {
        let findings = if extracted.clinical_findings.is_empty() {
            "none documented".to_string()
        } else {
            extracted.clinical_findings.join(", ")
        };
        let user_prompt = format!(
            "Clinical findings: {}\nRequested service: {}\nImaging evidence: {}\nTranscript: {}",
            findings,
            extracted.requested_service,
            if extracted.imaging_evidence.is_empty() { "none" } else { extracted.imaging_evidence.as_str() },
            extracted.transcript,
        );
        ReasoningRequest {
            system_prompt: CODING_SYSTEM_PROMPT.to_string(),
            user_prompt,
            model_id: self.settings.model_id.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            extended_reasoning: None,
        }
    }

    fn model_coding(&self, extracted: &ExtractedClinicalData) -> PriorAuthResult<CodingResult> {
        let backend = self.backend.as_ref().ok_or_else(|| PriorAuthError::CapabilityDisabled {
            capability: "reasoning".to_string(),
        })?;
        let response = backend.invoke(&self.build_request(extracted))?;
        let parsed = parse_model_coding(&response.text)?;

        let rationale = if parsed.rationale.is_empty() {
            "Codes proposed by reasoning model.".to_string()
        } else {
            parsed.rationale
        };
        Ok(CodingResult {
            diagnosis_code: parsed.diagnosis_code,
            procedure_code: parsed.procedure_code,
            confidence: parsed.confidence,
            rationale,
            source: provenance::MODEL.to_string(),
        })
    }
}

impl ClinicalCoder for CodingResolver {
    fn map_codes(&self, extracted: &ExtractedClinicalData) -> PriorAuthResult<CodingResult> {
        let signal = extracted.coding_signal_text();
        let mut failures: Vec<&'static str> = Vec::new();

        for strategy in &self.strategies {
            match strategy {
                CodingStrategy::Model => match self.model_coding(extracted) {
                    Ok(coding) => {
                        debug!(
                            diagnosis = %coding.diagnosis_code,
                            procedure = %coding.procedure_code,
                            "model coding accepted"
                        );
                        return Ok(apply_guardrails(coding, &signal));
                    }
                    Err(e) if self.settings.require_success => {
                        warn!(error = %e, "model coding failed in strict mode");
                        return Err(e);
                    }
                    Err(e) => {
                        warn!(error = %e, class = e.class(), "model coding failed, falling back");
                        failures.push(e.class());
                    }
                },
                CodingStrategy::Heuristic => break,
            }
        }

        let mut coding = heuristic_coding(&signal);
        if !failures.is_empty() {
            coding.source = provenance::HEURISTIC_FALLBACK.to_string();
            coding.rationale = format!(
                "{} Model coding unavailable ({}); heuristic fallback applied.",
                coding.rationale,
                failures.join(", ")
            );
        }
        let coding = apply_guardrails(coding, &signal);
        info!(
            diagnosis = %coding.diagnosis_code,
            procedure = %coding.procedure_code,
            source = %coding.source,
            "codes resolved"
        );
        Ok(coding)
    }
}
