//! Portal form payload construction.

use priorauth_contracts::{
    clinical::ExtractedClinicalData, coding::CodingResult, necessity::NecessityDecision,
    policy::PolicyMatch, submission::FormPayload,
};

/// Placeholder used when the transcript named no patient.
pub const UNKNOWN_PATIENT: &str = "Unknown Patient";

/// Build the portal form from the outputs of the earlier stages.
///
/// Pure function: the same inputs always produce the same payload.
pub fn build_form_payload(
    extracted: &ExtractedClinicalData,
    coding: &CodingResult,
    necessity: &NecessityDecision,
    policy: &PolicyMatch,
) -> FormPayload {
    let patient_name = if extracted.patient_name.trim().is_empty() {
        UNKNOWN_PATIENT.to_string()
    } else {
        extracted.patient_name.clone()
    };

    let fields = [
        ("patient_name", patient_name),
        ("date_of_birth", extracted.date_of_birth.clone()),
        ("member_id", extracted.member_id.clone()),
        ("payer_name", extracted.payer_name.clone()),
        ("provider_npi", extracted.provider_npi.clone()),
        ("requested_service", extracted.requested_service.clone()),
        ("facility_name", extracted.facility_name.clone()),
        ("diagnosis_code", coding.diagnosis_code.clone()),
        ("procedure_code", coding.procedure_code.clone()),
        ("clinical_justification", necessity.clinical_justification.clone()),
        ("urgency", extracted.urgency.clone()),
        ("policy_id", policy.policy_id.clone()),
        ("denial_risk_score", format!("{:.2}", necessity.denial_risk_score)),
    ];

    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
