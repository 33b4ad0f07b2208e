//! Structured clinical data extracted from a clinician transcript.

use serde::{Deserialize, Serialize};

/// Everything the intake collaborator pulled out of one transcript.
///
/// Produced once per workflow run and never mutated afterwards; every later
/// stage reads from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedClinicalData {
    /// The raw transcript text.
    pub transcript: String,
    pub patient_name: String,
    pub date_of_birth: String,
    /// Payer member id, e.g. `UHC-4429871`. Empty when the transcript has none.
    pub member_id: String,
    pub payer_name: String,
    pub provider_npi: String,
    pub requested_service: String,
    pub facility_name: String,
    /// `routine`, `urgent`, or `emergent`.
    pub urgency: String,
    /// Weeks of conservative therapy, when the transcript states a duration.
    pub conservative_therapy_weeks: Option<u32>,
    /// Imaging evidence phrase, e.g. `confirmed on X-ray`.
    pub imaging_evidence: String,
    /// Clinical-finding labels in detection order.
    pub clinical_findings: Vec<String>,
    pub notes: String,
}

impl ExtractedClinicalData {
    /// Lower-cased `transcript + findings` text used by criterion predicates.
    pub fn signal_text(&self) -> String {
        let mut parts = Vec::with_capacity(self.clinical_findings.len() + 1);
        parts.push(self.transcript.as_str());
        parts.extend(self.clinical_findings.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }

    /// Lower-cased `transcript + findings + requested service` text used by
    /// the coding heuristics and guardrails.
    pub fn coding_signal_text(&self) -> String {
        let mut signal = self.signal_text();
        signal.push(' ');
        signal.push_str(&self.requested_service.to_lowercase());
        signal
    }

    /// Weeks of conservative therapy, treating an unknown duration as zero.
    pub fn therapy_weeks(&self) -> u32 {
        self.conservative_therapy_weeks.unwrap_or(0)
    }
}
