//! Payer policy records and the per-run policy match.

use serde::{Deserialize, Serialize};

/// One medical-necessity criterion of a payer policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCriterion {
    /// Stable key used to select the evaluation predicate,
    /// e.g. `conservative_therapy_6w`.
    pub id: String,
    pub description: String,
}

impl PolicyCriterion {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }

    /// The description, or the id when the description is blank.
    pub fn label(&self) -> &str {
        if self.description.trim().is_empty() {
            &self.id
        } else {
            &self.description
        }
    }
}

/// A catalog entry: everything known about one payer policy, including the
/// matching metadata (prefixes, codes, keywords) used by local scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub policy_id: String,
    pub payer_name: String,
    #[serde(default)]
    pub member_prefixes: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub procedure_codes: Vec<String>,
    #[serde(default)]
    pub service_keywords: Vec<String>,
    pub criteria: Vec<PolicyCriterion>,
    #[serde(default = "default_minimum_criteria")]
    pub minimum_criteria: u32,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub denial_patterns: Vec<String>,
}

fn default_minimum_criteria() -> u32 {
    1
}

/// Where a `PolicyMatch` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    /// Parsed from a knowledge-base passage.
    KnowledgeBase,
    /// Selected from the local catalog; no knowledge base configured.
    Local,
    /// Selected from the local catalog after knowledge-base retrieval failed.
    LocalFallback,
}

impl std::fmt::Display for RetrievalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::KnowledgeBase => "knowledge_base",
            Self::Local => "local",
            Self::LocalFallback => "local_fallback",
        };
        f.write_str(tag)
    }
}

/// The policy selected for one workflow run. Read-only after selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMatch {
    pub policy_id: String,
    pub payer_name: String,
    pub title: String,
    /// Criteria in policy order.
    pub criteria: Vec<PolicyCriterion>,
    /// Minimum number of satisfied criteria; always at least 1.
    pub minimum_criteria: u32,
    pub required_documents: Vec<String>,
    pub denial_patterns: Vec<String>,
    pub source: RetrievalSource,
}

impl PolicyMatch {
    /// Project a catalog record into a match tagged with `source`.
    pub fn from_record(record: &PolicyRecord, source: RetrievalSource) -> Self {
        Self {
            policy_id: record.policy_id.clone(),
            payer_name: record.payer_name.clone(),
            title: record.title.clone(),
            criteria: record.criteria.clone(),
            minimum_criteria: record.minimum_criteria.max(1),
            required_documents: record.required_documents.clone(),
            denial_patterns: record.denial_patterns.clone(),
            source,
        }
    }
}
