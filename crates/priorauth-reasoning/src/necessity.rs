//! Medical-necessity evaluation and denial-risk scoring.

use std::collections::BTreeSet;

use tracing::info;

use priorauth_contracts::{
    clinical::ExtractedClinicalData,
    coding::CodingResult,
    error::PriorAuthResult,
    necessity::NecessityDecision,
    policy::PolicyMatch,
};
use priorauth_core::traits::NecessityAssessor;

use crate::justification::{JustificationContext, Justifier};

const NEURO_TERMS: [&str; 4] = ["radiculopathy", "weakness", "numbness", "sciatica"];
const OBJECTIVE_TERMS: [&str; 5] = ["herniation", "confirmed on", "seen on", "x-ray", "mri"];

/// Evaluate one criterion by id. Unknown ids are never met.
pub fn criterion_met(criterion_id: &str, extracted: &ExtractedClinicalData) -> bool {
    let signal = extracted.signal_text();
    let weeks = extracted.therapy_weeks();
    match criterion_id {
        "conservative_therapy_6w" => weeks >= 6,
        "radicular_symptoms" | "red_flag_or_neuro_deficit" => {
            NEURO_TERMS.iter().any(|term| signal.contains(term))
        }
        "objective_imaging_or_exam" => {
            !extracted.imaging_evidence.trim().is_empty()
                || OBJECTIVE_TERMS.iter().any(|term| signal.contains(term))
        }
        "persistent_pain" => signal.contains("pain") && weeks >= 4,
        "clinical_indication" => !extracted.clinical_findings.is_empty(),
        _ => false,
    }
}

/// Documents the transcript implies are on file.
pub fn infer_documents(extracted: &ExtractedClinicalData) -> BTreeSet<&'static str> {
    let mut documents = BTreeSet::from(["progress_notes"]);
    if extracted.therapy_weeks() >= 1 {
        documents.insert("conservative_therapy_notes");
    }
    if !extracted.imaging_evidence.trim().is_empty() {
        documents.insert("imaging_report");
    }
    documents
}

/// Inputs to the denial-risk score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskFactors {
    pub meets_criteria: bool,
    pub missing_criteria: usize,
    pub missing_documents: usize,
    pub coding_confidence: f64,
    pub coding_guardrailed: bool,
    pub coding_fallback: bool,
}

impl RiskFactors {
    pub fn new(
        meets_criteria: bool,
        missing_criteria: usize,
        missing_documents: usize,
        coding: &CodingResult,
    ) -> Self {
        Self {
            meets_criteria,
            missing_criteria,
            missing_documents,
            coding_confidence: coding.confidence,
            coding_guardrailed: coding.is_guardrailed(),
            coding_fallback: coding.is_fallback(),
        }
    }
}

pub const BASE_RISK: f64 = 0.12;
pub const UNMET_CRITERIA_RISK: f64 = 0.35;
pub const PER_MISSING_CRITERION_RISK: f64 = 0.08;
pub const PER_MISSING_DOCUMENT_RISK: f64 = 0.10;
pub const CODING_UNCERTAINTY_RISK: f64 = 0.12;
pub const GUARDRAILED_CODING_RISK: f64 = 0.08;
pub const FALLBACK_CODING_RISK: f64 = 0.05;
pub const MAX_RISK: f64 = 0.99;

/// Denial risk in `[0, 0.99]`, rounded to two decimals.
///
/// Non-decreasing in each factor: unmet criteria, missing counts, and lower
/// coding confidence never reduce it.
pub fn denial_risk(factors: &RiskFactors) -> f64 {
    let mut risk = BASE_RISK;
    if !factors.meets_criteria {
        risk += UNMET_CRITERIA_RISK;
    }
    risk += PER_MISSING_CRITERION_RISK * factors.missing_criteria as f64;
    risk += PER_MISSING_DOCUMENT_RISK * factors.missing_documents as f64;

    let confidence = if factors.coding_confidence.is_finite() {
        factors.coding_confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    risk += CODING_UNCERTAINTY_RISK * (1.0 - confidence);

    if factors.coding_guardrailed {
        risk += GUARDRAILED_CODING_RISK;
    } else if factors.coding_fallback {
        risk += FALLBACK_CODING_RISK;
    }

    (risk.clamp(0.0, MAX_RISK) * 100.0).round() / 100.0
}

/// `NecessityAssessor` implementation.
pub struct NecessityEvaluator {
    justifier: Justifier,
}

impl NecessityEvaluator {
    pub fn new(justifier: Justifier) -> Self {
        Self { justifier }
    }

    /// An evaluator that writes template justifications only.
    pub fn deterministic() -> Self {
        Self::new(Justifier::template_only())
    }
}

impl NecessityAssessor for NecessityEvaluator {
    fn evaluate_medical_necessity(
        &self,
        extracted: &ExtractedClinicalData,
        coding: &CodingResult,
        policy: &PolicyMatch,
    ) -> PriorAuthResult<NecessityDecision> {
        let mut satisfied = Vec::new();
        let mut missing = Vec::new();
        for criterion in &policy.criteria {
            let label = criterion.label().to_string();
            if criterion_met(&criterion.id, extracted) {
                satisfied.push(label);
            } else {
                missing.push(label);
            }
        }

        let meets_criteria = satisfied.len() >= policy.minimum_criteria.max(1) as usize;

        let available = infer_documents(extracted);
        let missing_documents: Vec<String> = policy
            .required_documents
            .iter()
            .filter(|doc| !available.contains(doc.as_str()))
            .cloned()
            .collect();

        let denial_risk_score = denial_risk(&RiskFactors::new(
            meets_criteria,
            missing.len(),
            missing_documents.len(),
            coding,
        ));

        let justification = self.justifier.justify(&JustificationContext {
            extracted,
            coding,
            policy,
            meets_criteria,
            satisfied: &satisfied,
            missing: &missing,
        })?;

        info!(
            policy_id = %policy.policy_id,
            meets_criteria,
            satisfied = satisfied.len(),
            missing = missing.len(),
            missing_documents = missing_documents.len(),
            denial_risk = denial_risk_score,
            "medical necessity evaluated"
        );

        Ok(NecessityDecision {
            meets_criteria,
            satisfied_criteria: satisfied,
            missing_criteria: missing,
            missing_documents,
            denial_risk_score,
            clinical_justification: justification.text,
            extended_reasoning_used: justification.extended_reasoning_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors() -> RiskFactors {
        RiskFactors {
            meets_criteria: true,
            missing_criteria: 0,
            missing_documents: 0,
            coding_confidence: 0.92,
            coding_guardrailed: false,
            coding_fallback: false,
        }
    }

    #[test]
    fn base_case_risk() {
        // 0.12 + 0.12 * 0.08 = 0.1296
        assert_eq!(denial_risk(&factors()), 0.13);
    }

    #[test]
    fn risk_is_monotonic_in_each_factor() {
        let base = denial_risk(&factors());
        let unmet = denial_risk(&RiskFactors { meets_criteria: false, ..factors() });
        let more_criteria = denial_risk(&RiskFactors { missing_criteria: 2, ..factors() });
        let more_docs = denial_risk(&RiskFactors { missing_documents: 1, ..factors() });
        let less_confident = denial_risk(&RiskFactors { coding_confidence: 0.4, ..factors() });
        let guardrailed = denial_risk(&RiskFactors { coding_guardrailed: true, ..factors() });
        let fallback = denial_risk(&RiskFactors { coding_fallback: true, ..factors() });

        for (label, risk) in [
            ("unmet", unmet),
            ("missing criteria", more_criteria),
            ("missing documents", more_docs),
            ("confidence", less_confident),
            ("guardrailed", guardrailed),
            ("fallback", fallback),
        ] {
            assert!(risk >= base, "{} lowered risk: {} < {}", label, risk, base);
        }
        assert!(guardrailed >= fallback);
    }

    #[test]
    fn risk_is_monotonic_across_the_factor_grid() {
        // (guardrailed, fallback) ordered by the risk each adds.
        let provenance = [(false, false), (false, true), (true, false), (true, true)];
        let at = |meets: bool, crit: usize, docs: usize, conf: usize, prov: usize| {
            let (guardrailed, fallback) = provenance[prov];
            denial_risk(&RiskFactors {
                meets_criteria: meets,
                missing_criteria: crit,
                missing_documents: docs,
                coding_confidence: conf as f64 / 10.0,
                coding_guardrailed: guardrailed,
                coding_fallback: fallback,
            })
        };

        for meets in [true, false] {
            for crit in 0..=5 {
                for docs in 0..=5 {
                    for conf in 0..=10 {
                        for prov in 0..provenance.len() {
                            let risk = at(meets, crit, docs, conf, prov);
                            let point = format!("meets={} crit={} docs={} conf={} prov={}", meets, crit, docs, conf, prov);
                            assert!((0.0..=MAX_RISK).contains(&risk), "{}: {}", point, risk);

                            if meets {
                                assert!(at(false, crit, docs, conf, prov) >= risk, "unmet lowered risk at {}", point);
                            }
                            if crit < 5 {
                                assert!(at(meets, crit + 1, docs, conf, prov) >= risk, "criterion lowered risk at {}", point);
                            }
                            if docs < 5 {
                                assert!(at(meets, crit, docs + 1, conf, prov) >= risk, "document lowered risk at {}", point);
                            }
                            if conf > 0 {
                                assert!(at(meets, crit, docs, conf - 1, prov) >= risk, "confidence lowered risk at {}", point);
                            }
                            if prov + 1 < provenance.len() {
                                assert!(at(meets, crit, docs, conf, prov + 1) >= risk, "provenance lowered risk at {}", point);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn risk_is_capped() {
        let worst = RiskFactors {
            meets_criteria: false,
            missing_criteria: 10,
            missing_documents: 10,
            coding_confidence: 0.0,
            coding_guardrailed: true,
            coding_fallback: true,
        };
        assert_eq!(denial_risk(&worst), 0.99);

        let nan = RiskFactors { coding_confidence: f64::NAN, ..factors() };
        let risk = denial_risk(&nan);
        assert!((0.0..=0.99).contains(&risk));
    }

    #[test]
    fn criterion_predicates() {
        let mut data = ExtractedClinicalData {
            transcript: "Persistent pain with numbness.".into(),
            conservative_therapy_weeks: Some(4),
            ..Default::default()
        };
        assert!(!criterion_met("conservative_therapy_6w", &data));
        assert!(criterion_met("persistent_pain", &data));
        assert!(criterion_met("red_flag_or_neuro_deficit", &data));
        assert!(!criterion_met("objective_imaging_or_exam", &data));
        assert!(!criterion_met("clinical_indication", &data));
        assert!(!criterion_met("made_up_criterion", &data));

        data.conservative_therapy_weeks = Some(6);
        data.imaging_evidence = "seen on MRI".into();
        data.clinical_findings = vec!["Numbness".into()];
        assert!(criterion_met("conservative_therapy_6w", &data));
        assert!(criterion_met("objective_imaging_or_exam", &data));
        assert!(criterion_met("clinical_indication", &data));
    }

    #[test]
    fn documents_follow_transcript_facts() {
        let data = ExtractedClinicalData::default();
        assert_eq!(infer_documents(&data), BTreeSet::from(["progress_notes"]));

        let data = ExtractedClinicalData {
            conservative_therapy_weeks: Some(1),
            imaging_evidence: "confirmed on X-ray".into(),
            ..Default::default()
        };
        assert_eq!(infer_documents(&data).len(), 3);
    }
}
