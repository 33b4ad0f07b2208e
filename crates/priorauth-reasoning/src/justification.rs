//! Clinical justification narrative with a resilient fallback chain.
//!
//!   extended-reasoning request → plain request → deterministic template
//!
//! The extended step only runs when configured. When every model step fails
//! the template is used and annotated with the failure classes, unless
//! strict mode asks for the last error instead.

use std::sync::Arc;

use tracing::{debug, warn};

use priorauth_contracts::{
    capability::{ExtendedReasoning, ReasoningRequest},
    clinical::ExtractedClinicalData,
    coding::CodingResult,
    error::{PriorAuthError, PriorAuthResult},
    policy::PolicyMatch,
};
use priorauth_core::{config::JustificationConfig, traits::ReasoningBackend};

const JUSTIFICATION_SYSTEM_PROMPT: &str = "You write concise prior-authorization clinical \
justifications for payer reviewers. Ground every statement in the supplied case facts and \
policy criteria. Reply with one plain-text paragraph.";

/// Facts the narrative is written from.
#[derive(Debug, Clone, Copy)]
pub struct JustificationContext<'a> {
    pub extracted: &'a ExtractedClinicalData,
    pub coding: &'a CodingResult,
    pub policy: &'a PolicyMatch,
    pub meets_criteria: bool,
    pub satisfied: &'a [String],
    pub missing: &'a [String],
}

/// A produced narrative and whether the extended request produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Justification {
    pub text: String,
    pub extended_reasoning_used: bool,
}

/// The deterministic narrative used when no model narrative is available.
pub fn template_justification(ctx: &JustificationContext<'_>) -> String {
    let extracted = ctx.extracted;
    let patient = if extracted.patient_name.is_empty() {
        "the patient"
    } else {
        extracted.patient_name.as_str()
    };
    let findings = if extracted.clinical_findings.is_empty() {
        "documented clinical findings".to_string()
    } else {
        extracted
            .clinical_findings
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };
    let therapy = match extracted.conservative_therapy_weeks {
        Some(weeks) if weeks > 0 => format!("{} weeks of conservative therapy", weeks),
        _ => "documented conservative management".to_string(),
    };
    let status = if ctx.meets_criteria { "meets" } else { "partially meets" };
    let satisfied = if ctx.satisfied.is_empty() {
        "clinical indication documented".to_string()
    } else {
        ctx.satisfied.iter().take(2).cloned().collect::<Vec<_>>().join("; ")
    };
    let missing = if ctx.missing.is_empty() {
        "none".to_string()
    } else {
        ctx.missing.iter().take(2).cloned().collect::<Vec<_>>().join("; ")
    };

    format!(
        "Per {}, {} {} criteria for {} due to {}. Case history includes {}. \
         Primary diagnosis mapped to {}. Satisfied criteria: {}. Missing criteria: {}.",
        ctx.policy.title,
        patient,
        status,
        ctx.coding.procedure_code,
        findings,
        therapy,
        ctx.coding.diagnosis_code,
        satisfied,
        missing
    )
}

/// Model request parameters for justification.
#[derive(Debug, Clone, PartialEq)]
pub struct JustificationSettings {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Budget for the extended request; `None` skips that step.
    pub extended_reasoning: Option<ExtendedReasoning>,
    pub require_success: bool,
}

impl From<&JustificationConfig> for JustificationSettings {
    fn from(config: &JustificationConfig) -> Self {
        Self {
            model_id: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            extended_reasoning: config.extended_reasoning.then_some(ExtendedReasoning {
                budget_tokens: config.reasoning_budget_tokens,
            }),
            require_success: config.require_success,
        }
    }
}

/// Produces the justification narrative.
pub struct Justifier {
    backend: Option<Arc<dyn ReasoningBackend>>,
    settings: Option<JustificationSettings>,
}

impl Justifier {
    /// Always use the deterministic template.
    pub fn template_only() -> Self {
        Self {
            backend: None,
            settings: None,
        }
    }

    pub fn with_model(backend: Arc<dyn ReasoningBackend>, settings: JustificationSettings) -> Self {
        Self {
            backend: Some(backend),
            settings: Some(settings),
        }
    }

    fn build_request(
        &self,
        settings: &JustificationSettings,
        ctx: &JustificationContext<'_>,
        extended: Option<ExtendedReasoning>,
    ) -> ReasoningRequest {
        let criteria = ctx
            .policy
            .criteria
            .iter()
            .map(|c| format!("- {}: {}", c.id, c.label()))
            .collect::<Vec<_>>()
            .join("\n");
        let user_prompt = format!(
            "Policy: {} ({}), minimum {} criteria.\nCriteria:\n{}\n\
             Diagnosis: {}  Procedure: {}\nFindings: {}\nConservative therapy weeks: {}\n\
             Imaging evidence: {}\nSatisfied: {}\nMissing: {}\nMeets criteria: {}",
            ctx.policy.title,
            ctx.policy.policy_id,
            ctx.policy.minimum_criteria,
            criteria,
            ctx.coding.diagnosis_code,
            ctx.coding.procedure_code,
            ctx.extracted.clinical_findings.join(", "),
            ctx.extracted
                .conservative_therapy_weeks
                .map_or_else(|| "unknown".to_string(), |w| w.to_string()),
            ctx.extracted.imaging_evidence,
            ctx.satisfied.join("; "),
            ctx.missing.join("; "),
            ctx.meets_criteria,
        );
        ReasoningRequest {
            system_prompt: JUSTIFICATION_SYSTEM_PROMPT.to_string(),
            user_prompt,
            model_id: settings.model_id.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            extended_reasoning: extended,
        }
    }

    fn invoke(
        backend: &dyn ReasoningBackend,
        request: &ReasoningRequest,
    ) -> PriorAuthResult<String> {
        let response = backend.invoke(request)?;
        let text = response.text.trim();
        if text.is_empty() {
            return Err(PriorAuthError::MalformedOutput {
                reason: "empty justification narrative".to_string(),
            });
        }
        Ok(text.to_string())
    }

    /// Run the fallback chain.
    ///
    /// # Errors
    ///
    /// Only in strict mode, with the error of the last model attempt.
    pub fn justify(&self, ctx: &JustificationContext<'_>) -> PriorAuthResult<Justification> {
        let (Some(backend), Some(settings)) = (self.backend.as_deref(), self.settings.as_ref()) else {
            return Ok(Justification {
                text: template_justification(ctx),
                extended_reasoning_used: false,
            });
        };

        let mut attempts: Vec<Option<ExtendedReasoning>> = Vec::with_capacity(2);
        if let Some(extended) = settings.extended_reasoning {
            attempts.push(Some(extended));
        }
        attempts.push(None);

        let mut failures: Vec<&'static str> = Vec::new();
        let mut last_error = None;
        for extended in attempts {
            let request = self.build_request(settings, ctx, extended);
            match Self::invoke(backend, &request) {
                Ok(text) => {
                    debug!(extended = extended.is_some(), "model justification accepted");
                    return Ok(Justification {
                        text,
                        extended_reasoning_used: extended.is_some(),
                    });
                }
                Err(e) => {
                    warn!(
                        extended = extended.is_some(),
                        error = %e,
                        "justification request failed"
                    );
                    failures.push(e.class());
                    last_error = Some(e);
                }
            }
        }

        if settings.require_success {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        Ok(Justification {
            text: format!(
                "{} [Template justification used after narrative generation failed: {}.]",
                template_justification(ctx),
                failures.join(", ")
            ),
            extended_reasoning_used: false,
        })
    }
}
