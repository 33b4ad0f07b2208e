//! Parser for semi-structured policy documents returned by a knowledge base.
//!
//! Knowledge-base chunks arrive as free text, sometimes with their line
//! breaks flattened. Parsing runs in two passes:
//!
//! 1. **Normalize**: a chunk with no line breaks at all is reflowed. A line
//!    break goes before the first occurrence of each header, before each
//!    numbered criterion in the criteria section, and before each bullet in
//!    the document and denial lists. Chunks that kept their line breaks are
//!    left alone, so ` - ` or `Payer:` inside a value is never split.
//! 2. **Scan**: walk the lines, reading scalar headers (`Policy ID:`,
//!    `Payer:`, `Title:`, …) directly and collecting numbered criteria and
//!    bulleted lists into the current section. A section ends at a blank
//!    line or the next header.
//!
//! A document without a policy id, payer, title, or at least one criterion
//! is rejected.

use std::sync::LazyLock;

use regex::Regex;

use priorauth_contracts::{
    error::{PriorAuthError, PriorAuthResult},
    policy::{PolicyCriterion, PolicyRecord},
};

const POLICY_ID: &str = "Policy ID:";
const PAYER: &str = "Payer:";
const PREFIXES: &str = "Member ID Prefixes:";
const TITLE: &str = "Title:";
const CODES: &str = "Covered Procedure Codes:";
const KEYWORDS: &str = "Service Keywords:";
const CRITERIA: &str = "Medical Necessity Criteria";
const DOCUMENTS: &str = "Required Documents:";
const DENIALS: &str = "Common Denial Patterns:";

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[ \t]*(Policy ID:|Member ID Prefixes:|Payer:|Title:|Covered Procedure Codes:|Service Keywords:|Medical Necessity Criteria|Required Documents:|Common Denial Patterns:)",
    )
    .expect("header regex is valid")
});

static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]+(\d+)\.[ \t]+([A-Za-z0-9_]+):").expect("numbered regex is valid")
});

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+-[ \t]+").expect("bullet regex is valid"));

static CRITERION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\s*([A-Za-z0-9_]+)\s*:\s*(.*)$").expect("criterion regex is valid")
});

static MINIMUM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\s*minimum\s+(\d+)\s+of\s+\d+[^)]*\)").expect("minimum regex is valid")
});

static CPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5})\b").expect("cpt regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Criteria,
    Documents,
    Denials,
}

/// Re-insert line breaks so flattened chunks parse like the source document.
///
/// Text that already contains a line break is returned with only its line
/// endings normalized.
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    if text.contains('\n') {
        return text;
    }
    reflow(&text)
}

fn reflow(text: &str) -> String {
    // Only the first occurrence of a header starts a line; later ones sit
    // inside a value such as a denial pattern.
    let mut seen: Vec<&str> = Vec::new();
    let mut split = String::with_capacity(text.len() + 64);
    let mut last = 0;
    for caps in HEADER_RE.captures_iter(text) {
        let (Some(whole), Some(header)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if seen.contains(&header.as_str()) {
            continue;
        }
        seen.push(header.as_str());
        split.push_str(&text[last..whole.start()]);
        split.push('\n');
        split.push_str(header.as_str());
        last = whole.end();
    }
    split.push_str(&text[last..]);

    split
        .lines()
        .map(|line| {
            if line.starts_with(CRITERIA) {
                NUMBERED_RE.replace_all(line, "\n$1. $2:").into_owned()
            } else if line.starts_with(DOCUMENTS) || line.starts_with(DENIALS) {
                BULLET_RE.replace_all(line, "\n- ").into_owned()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse one knowledge-base passage into a policy record.
///
/// # Errors
///
/// Returns `PriorAuthError::KnowledgeBase` naming the missing fields when the
/// passage lacks a policy id, payer, title, or criteria.
pub fn parse_policy_document(text: &str) -> PriorAuthResult<PolicyRecord> {
    let normalized = normalize(text);

    let mut policy_id = String::new();
    let mut payer_name = String::new();
    let mut title = String::new();
    let mut member_prefixes = Vec::new();
    let mut procedure_codes = Vec::new();
    let mut service_keywords = Vec::new();
    let mut criteria = Vec::new();
    let mut minimum: Option<u32> = None;
    let mut required_documents = Vec::new();
    let mut denial_patterns = Vec::new();

    let mut section: Option<Section> = None;

    for raw in normalized.lines() {
        let line = raw.trim();
        if line.is_empty() {
            section = None;
            continue;
        }

        if let Some(value) = line.strip_prefix(POLICY_ID) {
            policy_id = value.trim().to_string();
            section = None;
        } else if let Some(value) = line.strip_prefix(PREFIXES) {
            member_prefixes = split_list(value).map(|p| p.to_uppercase()).collect();
            section = None;
        } else if let Some(value) = line.strip_prefix(PAYER) {
            payer_name = value.trim().to_string();
            section = None;
        } else if let Some(value) = line.strip_prefix(TITLE) {
            title = value.trim().to_string();
            section = None;
        } else if let Some(value) = line.strip_prefix(CODES) {
            procedure_codes = CPT_RE
                .captures_iter(value)
                .map(|c| c[1].to_string())
                .collect();
            section = None;
        } else if let Some(value) = line.strip_prefix(KEYWORDS) {
            service_keywords = split_list(value).map(|k| k.to_lowercase()).collect();
            section = None;
        } else if line.starts_with(CRITERIA) {
            minimum = MINIMUM_RE
                .captures(line)
                .and_then(|c| c[1].parse::<u32>().ok());
            section = Some(Section::Criteria);
        } else if line.starts_with(DOCUMENTS) {
            section = Some(Section::Documents);
        } else if line.starts_with(DENIALS) {
            section = Some(Section::Denials);
        } else {
            match section {
                Some(Section::Criteria) => {
                    if let Some(caps) = CRITERION_RE.captures(line) {
                        criteria.push(PolicyCriterion::new(&caps[1], caps[2].trim()));
                    }
                }
                Some(Section::Documents) => {
                    if let Some(item) = bullet_item(line) {
                        required_documents.push(item.to_string());
                    }
                }
                Some(Section::Denials) => {
                    if let Some(item) = bullet_item(line) {
                        denial_patterns.push(item.to_string());
                    }
                }
                None => {}
            }
        }
    }

    let mut missing = Vec::new();
    if policy_id.is_empty() {
        missing.push("policy id");
    }
    if payer_name.is_empty() {
        missing.push("payer");
    }
    if title.is_empty() {
        missing.push("title");
    }
    if criteria.is_empty() {
        missing.push("criteria");
    }
    if !missing.is_empty() {
        return Err(PriorAuthError::KnowledgeBase {
            reason: format!("policy passage missing {}", missing.join(", ")),
        });
    }

    Ok(PolicyRecord {
        policy_id,
        payer_name,
        member_prefixes,
        title,
        procedure_codes,
        service_keywords,
        criteria,
        minimum_criteria: minimum.unwrap_or(1).max(1),
        required_documents,
        denial_patterns,
    })
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn bullet_item(line: &str) -> Option<&str> {
    let item = line
        .strip_prefix('-')
        .or_else(|| line.strip_prefix('*'))
        .or_else(|| line.strip_prefix('•'))?
        .trim();
    (!item.is_empty()).then_some(item)
}

/// Render `record` in the document layout `parse_policy_document` reads.
///
/// Used to prepare knowledge-base source documents from a catalog.
pub fn render_policy_document(record: &PolicyRecord) -> String {
    let mut doc = format!("{} {}\n{} {}\n", POLICY_ID, record.policy_id, PAYER, record.payer_name);
    if !record.member_prefixes.is_empty() {
        doc.push_str(&format!("{} {}\n", PREFIXES, record.member_prefixes.join(", ")));
    }
    doc.push_str(&format!("{} {}\n", TITLE, record.title));

    if !record.procedure_codes.is_empty() {
        doc.push_str(&format!("\n{} {}\n", CODES, record.procedure_codes.join(", ")));
    }
    if !record.service_keywords.is_empty() {
        doc.push_str(&format!("\n{} {}\n", KEYWORDS, record.service_keywords.join(", ")));
    }

    doc.push_str(&format!(
        "\n{} (minimum {} of {} must be met):\n",
        CRITERIA,
        record.minimum_criteria,
        record.criteria.len()
    ));
    for (idx, criterion) in record.criteria.iter().enumerate() {
        doc.push_str(&format!("{}. {}: {}\n", idx + 1, criterion.id, criterion.description));
    }

    for (header, items) in [(DOCUMENTS, &record.required_documents), (DENIALS, &record.denial_patterns)] {
        if items.is_empty() {
            continue;
        }
        doc.push_str(&format!("\n{}\n", header));
        for item in items {
            doc.push_str(&format!("- {}\n", item));
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    const UHC_DOC: &str = "Policy ID: UHC-LUMBAR-MRI-2026
Payer: UnitedHealthcare
Member ID Prefixes: UHC, UHG
Title: Lumbar Spine MRI Medical Necessity Policy

Covered Procedure Codes: 72148 (MRI lumbar spine without contrast), 72149 (MRI lumbar spine with contrast), 72158 (MRI lumbar spine without and with contrast)

Service Keywords: lumbar spine mri, mri lumbar, lumbar mri

Medical Necessity Criteria (minimum 2 of 3 must be met):
1. conservative_therapy_6w: Failure of at least 6 weeks of conservative therapy.
2. radicular_symptoms: Radicular symptoms or neurologic deficit are documented.
3. objective_imaging_or_exam: Objective imaging or exam findings support lumbar pathology.

Required Documents:
- progress_notes
- conservative_therapy_notes
- imaging_report

Common Denial Patterns:
- Missing conservative treatment duration
- Insufficient neurologic findings documentation
";

    #[test]
    fn parses_canonical_document() {
        let policy = parse_policy_document(UHC_DOC).unwrap();
        assert_eq!(policy.policy_id, "UHC-LUMBAR-MRI-2026");
        assert_eq!(policy.payer_name, "UnitedHealthcare");
        assert_eq!(policy.title, "Lumbar Spine MRI Medical Necessity Policy");
        assert_eq!(policy.member_prefixes, vec!["UHC", "UHG"]);
        assert_eq!(policy.procedure_codes, vec!["72148", "72149", "72158"]);
        assert_eq!(policy.service_keywords, vec!["lumbar spine mri", "mri lumbar", "lumbar mri"]);
        assert_eq!(policy.minimum_criteria, 2);
        assert_eq!(policy.criteria.len(), 3);
        assert_eq!(policy.criteria[1].id, "radicular_symptoms");
        assert_eq!(
            policy.criteria[0].description,
            "Failure of at least 6 weeks of conservative therapy."
        );
        assert_eq!(
            policy.required_documents,
            vec!["progress_notes", "conservative_therapy_notes", "imaging_report"]
        );
        assert_eq!(policy.denial_patterns.len(), 2);
    }

    /// A chunk with every line break flattened parses to the same record.
    #[test]
    fn parses_single_line_chunk() {
        let flattened = UHC_DOC.split_whitespace().collect::<Vec<_>>().join(" ");
        let policy = parse_policy_document(&flattened).unwrap();
        assert_eq!(policy, parse_policy_document(UHC_DOC).unwrap());
    }

    #[test]
    fn minimum_defaults_to_one() {
        let doc = "Policy ID: P-1\nPayer: Cigna\nTitle: Imaging\nMedical Necessity Criteria:\n1. clinical_indication: Documented.\n";
        let policy = parse_policy_document(doc).unwrap();
        assert_eq!(policy.minimum_criteria, 1);
        assert!(policy.required_documents.is_empty());
    }

    #[test]
    fn blank_line_ends_bullet_section() {
        let doc = "Policy ID: P-1\nPayer: Cigna\nTitle: Imaging\nMedical Necessity Criteria:\n1. a: A.\n\nRequired Documents:\n- progress_notes\n\n- stray_item\n";
        let policy = parse_policy_document(doc).unwrap();
        assert_eq!(policy.required_documents, vec!["progress_notes"]);
    }

    #[test]
    fn rejects_passage_without_required_fields() {
        let err = parse_policy_document("Payer: Aetna\nSome unrelated marketing text.").unwrap_err();
        match err {
            PriorAuthError::KnowledgeBase { reason } => {
                assert!(reason.contains("policy id"), "reason: {}", reason);
                assert!(reason.contains("criteria"), "reason: {}", reason);
                assert!(!reason.contains("payer"), "payer was present: {}", reason);
            }
            other => panic!("expected KnowledgeBase error, got {:?}", other),
        }
    }

    #[test]
    fn rendered_catalog_parses_back() {
        for record in crate::catalog::default_policies() {
            let doc = render_policy_document(&record);
            assert_eq!(parse_policy_document(&doc).unwrap(), record, "document:\n{}", doc);
        }
    }

    const DASHED_DOC: &str = "Policy ID: AET-LUMBAR-MRI-2026
Payer: Aetna
Title: Lumbar Spine - MRI Policy

Medical Necessity Criteria (minimum 1 of 2 must be met):
1. pain_documented: Pain - documented on exam.
2. conservative_therapy_6w: Six weeks of therapy.

Common Denial Patterns:
- Missing notes - older than 30 days
- Wrong Payer: plan mismatch
";

    #[test]
    fn dashes_and_headers_inside_values_stay_intact() {
        let policy = parse_policy_document(DASHED_DOC).unwrap();
        assert_eq!(policy.payer_name, "Aetna");
        assert_eq!(policy.title, "Lumbar Spine - MRI Policy");
        assert_eq!(policy.criteria.len(), 2);
        assert_eq!(policy.criteria[0].description, "Pain - documented on exam.");
        assert_eq!(
            policy.denial_patterns,
            vec!["Missing notes - older than 30 days", "Wrong Payer: plan mismatch"]
        );
    }

    #[test]
    fn flattened_chunk_splits_only_section_bullets_and_first_headers() {
        let flattened = DASHED_DOC.split_whitespace().collect::<Vec<_>>().join(" ");
        let policy = parse_policy_document(&flattened).unwrap();
        assert_eq!(policy.payer_name, "Aetna");
        assert_eq!(policy.title, "Lumbar Spine - MRI Policy");
        assert_eq!(policy.criteria[0].description, "Pain - documented on exam.");
        assert_eq!(policy.denial_patterns.last().map(String::as_str), Some("Wrong Payer: plan mismatch"));
    }

    #[test]
    fn rendered_record_with_dashes_parses_back() {
        let mut record = parse_policy_document(UHC_DOC).unwrap();
        record.title = "Lumbar Spine - MRI Policy".to_string();
        record.criteria[1].description = "Back pain - radiating to leg.".to_string();
        record.denial_patterns.push("Missing notes - older than 30 days".to_string());
        record.denial_patterns.push("Wrong Payer: plan mismatch".to_string());

        let doc = render_policy_document(&record);
        assert_eq!(parse_policy_document(&doc).unwrap(), record, "document:\n{}", doc);
    }

    #[test]
    fn rendered_document_matches_source_layout() {
        let record = parse_policy_document(UHC_DOC).unwrap();
        let doc = render_policy_document(&record);
        assert!(doc.starts_with("Policy ID: UHC-LUMBAR-MRI-2026\nPayer: UnitedHealthcare\nMember ID Prefixes: UHC, UHG\n"));
        assert!(doc.contains("\nMedical Necessity Criteria (minimum 2 of 3 must be met):\n1. conservative_therapy_6w:"));
        assert!(doc.ends_with("- Insufficient neurologic findings documentation\n"));
    }
}
