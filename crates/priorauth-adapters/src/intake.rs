//! Regex transcript intake.
//!
//! Pulls structured fields out of a free-text clinician transcript with a
//! handful of fixed patterns. Anything it cannot find is left empty; the
//! orchestrator decides what a missing field means.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use priorauth_contracts::{clinical::ExtractedClinicalData, error::PriorAuthResult};
use priorauth_core::traits::IntakeAgent;

pub const DEFAULT_PROVIDER_NPI: &str = "1234567890";
pub const DEFAULT_FACILITY: &str = "Demo Outpatient Center";

/// Lower-case alias → canonical payer name, checked in order.
const PAYER_ALIASES: [(&str, &str); 6] = [
    ("unitedhealthcare", "UnitedHealthcare"),
    ("uhc", "UnitedHealthcare"),
    ("aetna", "Aetna"),
    ("cigna", "Cigna"),
    ("humana", "Humana"),
    ("medicare", "Medicare"),
];

const MEMBER_PREFIX_PAYERS: [(&str, &str); 5] = [
    ("UHC", "UnitedHealthcare"),
    ("UHG", "UnitedHealthcare"),
    ("AET", "Aetna"),
    ("ATN", "Aetna"),
    ("CIG", "Cigna"),
];

const FINDING_KEYWORDS: [(&str, &str); 6] = [
    ("radiculopathy", "Radiculopathy"),
    ("disc herniation", "Disc herniation"),
    ("numbness", "Numbness"),
    ("weakness", "Motor weakness"),
    ("back pain", "Back pain"),
    ("sciatica", "Sciatica symptoms"),
];

const NUMBER_WORDS: [&str; 12] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven", "twelve",
];

const DATE_FORMATS: [&str; 6] = ["%B %d %Y", "%B %d, %Y", "%b %d %Y", "%b %d, %Y", "%m/%d/%Y", "%Y-%m-%d"];

static PATIENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfor\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,2})").expect("patient regex is valid")
});

static DOB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)date of birth\s+([A-Za-z]+\s+\d{1,2}(?:,\s*|\s+)\d{4}|\d{1,2}/\d{1,2}/\d{4}|\d{4}-\d{2}-\d{2})",
    )
    .expect("date of birth regex is valid")
});

static MEMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,5}-\d{5,12})\b").expect("member id regex is valid"));

static NPI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bNPI\s*(\d{10})\b").expect("NPI regex is valid"));

static FACILITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bat\s+(?:our\s+)?([A-Za-z0-9 .'-]+?)(?:[,.]|$)").expect("facility regex is valid")
});

static WEEKS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s+weeks?\s+of\s+(?:physical\s+therapy|conservative)",
    )
    .expect("therapy weeks regex is valid")
});

static IMAGING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(confirmed on [^,.]+|seen on [^,.]+|demonstrated on [^,.]+)")
        .expect("imaging evidence regex is valid")
});

fn has_token(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_ascii_alphanumeric()).any(|t| t == word)
}

/// `IntakeAgent` backed by regular expressions.
#[derive(Debug, Clone)]
pub struct RegexIntake {
    default_provider_npi: String,
}

impl Default for RegexIntake {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER_NPI)
    }
}

impl RegexIntake {
    pub fn new(default_provider_npi: impl Into<String>) -> Self {
        Self {
            default_provider_npi: default_provider_npi.into(),
        }
    }
}

pub fn extract_patient_name(text: &str) -> String {
    PATIENT_RE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default()
}

/// ISO date when the phrase parses, the raw phrase otherwise.
pub fn extract_date_of_birth(text: &str) -> String {
    let Some(caps) = DOB_RE.captures(text) else {
        return String::new();
    };
    let raw = caps[1].trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn extract_member_id(text: &str) -> String {
    MEMBER_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}

/// Payer from an alias in the transcript, else from the member-id prefix.
pub fn infer_payer(lowered: &str, member_id: &str) -> String {
    if let Some((_, payer)) = PAYER_ALIASES.iter().find(|(alias, _)| lowered.contains(alias)) {
        return payer.to_string();
    }
    let prefix = member_id.split('-').next().unwrap_or_default().to_uppercase();
    MEMBER_PREFIX_PAYERS
        .iter()
        .find(|(p, _)| !prefix.is_empty() && *p == prefix)
        .map_or("Generic Payer", |(_, payer)| *payer)
        .to_string()
}

pub fn infer_requested_service(lowered: &str) -> &'static str {
    let mri = lowered.contains("mri");
    if mri && lowered.contains("lumbar") {
        "MRI lumbar spine without contrast"
    } else if mri {
        "MRI study"
    } else if has_token(lowered, "ct") {
        "CT study"
    } else {
        "Imaging service"
    }
}

pub fn extract_facility(text: &str) -> String {
    let facility = FACILITY_RE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();
    match facility.to_lowercase().as_str() {
        "" | "facility" | "our facility" => DEFAULT_FACILITY.to_string(),
        _ => facility,
    }
}

pub fn infer_urgency(lowered: &str) -> &'static str {
    if lowered.contains("emergent") || lowered.contains("immediate") {
        "emergent"
    } else if lowered.contains("urgent") || lowered.contains("24 hours") {
        "urgent"
    } else {
        "routine"
    }
}

/// Weeks of therapy, written in digits or as a word up to twelve.
pub fn extract_therapy_weeks(lowered: &str) -> Option<u32> {
    let caps = WEEKS_RE.captures(lowered)?;
    let amount = &caps[1];
    amount.parse::<u32>().ok().or_else(|| {
        NUMBER_WORDS
            .iter()
            .position(|w| *w == amount)
            .map(|idx| idx as u32 + 1)
    })
}

pub fn extract_imaging_evidence(text: &str) -> String {
    IMAGING_RE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default()
}

pub fn extract_findings(lowered: &str) -> Vec<String> {
    let findings: Vec<String> = FINDING_KEYWORDS
        .iter()
        .filter(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, label)| label.to_string())
        .collect();
    if findings.is_empty() {
        vec!["General clinical indication documented".to_string()]
    } else {
        findings
    }
}

impl IntakeAgent for RegexIntake {
    fn ingest(&self, transcript: &str) -> PriorAuthResult<ExtractedClinicalData> {
        let normalized = transcript.split_whitespace().collect::<Vec<_>>().join(" ");
        let lowered = normalized.to_lowercase();

        let member_id = extract_member_id(&normalized);
        let payer_name = infer_payer(&lowered, &member_id);
        let provider_npi = NPI_RE
            .captures(&normalized)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| self.default_provider_npi.clone());

        let extracted = ExtractedClinicalData {
            patient_name: extract_patient_name(&normalized),
            date_of_birth: extract_date_of_birth(&normalized),
            member_id,
            payer_name,
            provider_npi,
            requested_service: infer_requested_service(&lowered).to_string(),
            facility_name: extract_facility(&normalized),
            urgency: infer_urgency(&lowered).to_string(),
            conservative_therapy_weeks: extract_therapy_weeks(&lowered),
            imaging_evidence: extract_imaging_evidence(&normalized),
            clinical_findings: extract_findings(&lowered),
            notes: normalized.clone(),
            transcript: normalized,
        };
        debug!(
            member_id = %extracted.member_id,
            payer = %extracted.payer_name,
            findings = extracted.clinical_findings.len(),
            "transcript parsed"
        );
        Ok(extracted)
    }
}
