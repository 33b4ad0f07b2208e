//! Payer policy catalog: the built-in defaults, file loading, and bootstrap.
//!
//! A catalog file is either a JSON array of `PolicyRecord`s or a TOML
//! document with a `[[policies]]` array, chosen by file extension:
//!
//! ```toml
//! [[policies]]
//! policy_id = "UHC-LUMBAR-MRI-2026"
//! payer_name = "UnitedHealthcare"
//! title = "Lumbar Spine MRI Medical Necessity Policy"
//! minimum_criteria = 2
//!
//! [[policies.criteria]]
//! id = "conservative_therapy_6w"
//! description = "Failure of at least 6 weeks of conservative therapy."
//! ```
//!
//! An unreadable or malformed catalog never stops a run: `PolicyStore`
//! logs a warning and serves the built-in catalog instead.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use priorauth_contracts::{
    error::{PriorAuthError, PriorAuthResult},
    policy::{PolicyCriterion, PolicyRecord},
};

use crate::kb_text::render_policy_document;

/// TOML wrapper around the policy list.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    policies: Vec<PolicyRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CatalogFormat {
    Json,
    Toml,
}

impl CatalogFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

// ── Built-in catalog ─────────────────────────────────────────────────────────

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The built-in three-entry catalog.
///
/// Order matters: ties in local scoring keep the earlier entry, and the last
/// entry is the generic default.
pub fn default_policies() -> Vec<PolicyRecord> {
    vec![
        PolicyRecord {
            policy_id: "UHC-LUMBAR-MRI-2026".into(),
            payer_name: "UnitedHealthcare".into(),
            member_prefixes: strings(&["UHC", "UHG"]),
            title: "Lumbar Spine MRI Medical Necessity Policy".into(),
            procedure_codes: strings(&["72148", "72149", "72158"]),
            service_keywords: strings(&["lumbar spine mri", "mri lumbar", "lumbar mri"]),
            criteria: vec![
                PolicyCriterion::new(
                    "conservative_therapy_6w",
                    "Failure of at least 6 weeks of conservative therapy.",
                ),
                PolicyCriterion::new(
                    "radicular_symptoms",
                    "Radicular symptoms or neurologic deficit are documented.",
                ),
                PolicyCriterion::new(
                    "objective_imaging_or_exam",
                    "Objective imaging or exam findings support lumbar pathology.",
                ),
            ],
            minimum_criteria: 2,
            required_documents: strings(&["progress_notes", "conservative_therapy_notes", "imaging_report"]),
            denial_patterns: strings(&[
                "Missing conservative treatment duration",
                "Insufficient neurologic findings documentation",
            ]),
        },
        PolicyRecord {
            policy_id: "AETNA-LUMBAR-MRI-2026".into(),
            payer_name: "Aetna".into(),
            member_prefixes: strings(&["AET", "ATN"]),
            title: "Aetna Advanced Imaging Prior Authorization Criteria".into(),
            procedure_codes: strings(&["72148", "72149", "72158"]),
            service_keywords: strings(&["mri", "lumbar"]),
            criteria: vec![
                PolicyCriterion::new(
                    "conservative_therapy_6w",
                    "At least 6 weeks of physician-directed conservative treatment.",
                ),
                PolicyCriterion::new("persistent_pain", "Persistent back or leg pain despite treatment."),
                PolicyCriterion::new(
                    "red_flag_or_neuro_deficit",
                    "Neurologic deficit or red-flag symptom is present.",
                ),
            ],
            minimum_criteria: 2,
            required_documents: strings(&["progress_notes", "conservative_therapy_notes"]),
            denial_patterns: strings(&[
                "No documented treatment progression",
                "Requested service not mapped to diagnosis",
            ]),
        },
        PolicyRecord {
            policy_id: "GENERIC-IMAGING-DEFAULT".into(),
            payer_name: "Generic Payer".into(),
            member_prefixes: Vec::new(),
            title: "Generic Imaging Prior Authorization Criteria".into(),
            procedure_codes: Vec::new(),
            service_keywords: Vec::new(),
            criteria: vec![
                PolicyCriterion::new(
                    "clinical_indication",
                    "Clinical indication for the requested service is documented.",
                ),
                PolicyCriterion::new(
                    "conservative_therapy_6w",
                    "Conservative therapy history is provided when appropriate.",
                ),
            ],
            minimum_criteria: 1,
            required_documents: strings(&["progress_notes"]),
            denial_patterns: strings(&["Demographic mismatch", "Missing clinical rationale"]),
        },
    ]
}

/// The generic default policy, used when nothing else can be selected.
pub fn fallback_policy() -> PolicyRecord {
    let mut defaults = default_policies();
    // The built-in catalog is a non-empty literal.
    defaults.swap_remove(defaults.len() - 1)
}

// ── Parsing and serialization ────────────────────────────────────────────────

/// Parse a JSON array of policy records.
pub fn from_json_str(s: &str) -> PriorAuthResult<Vec<PolicyRecord>> {
    serde_json::from_str(s).map_err(|e| PriorAuthError::PolicyStore {
        reason: format!("failed to parse policy JSON: {}", e),
    })
}

/// Parse a TOML document with a `[[policies]]` array.
pub fn from_toml_str(s: &str) -> PriorAuthResult<Vec<PolicyRecord>> {
    let file: CatalogFile = toml::from_str(s).map_err(|e| PriorAuthError::PolicyStore {
        reason: format!("failed to parse policy TOML: {}", e),
    })?;
    Ok(file.policies)
}

/// Read and parse the catalog at `path`, choosing the format by extension.
pub fn from_file(path: &Path) -> PriorAuthResult<Vec<PolicyRecord>> {
    let contents = std::fs::read_to_string(path).map_err(|e| PriorAuthError::PolicyStore {
        reason: format!("failed to read policy catalog '{}': {}", path.display(), e),
    })?;
    match CatalogFormat::for_path(path) {
        CatalogFormat::Json => from_json_str(&contents),
        CatalogFormat::Toml => from_toml_str(&contents),
    }
}

fn render(records: &[PolicyRecord], format: CatalogFormat) -> PriorAuthResult<String> {
    match format {
        CatalogFormat::Json => serde_json::to_string_pretty(records).map_err(|e| PriorAuthError::PolicyStore {
            reason: format!("failed to serialize policy JSON: {}", e),
        }),
        CatalogFormat::Toml => {
            let file = CatalogFile { policies: records.to_vec() };
            toml::to_string_pretty(&file).map_err(|e| PriorAuthError::PolicyStore {
                reason: format!("failed to serialize policy TOML: {}", e),
            })
        }
    }
}

/// Write the built-in catalog to `destination`.
///
/// An existing file is left untouched unless `overwrite` is set. Parent
/// directories are created as needed. Returns the destination path.
pub fn bootstrap(destination: &Path, overwrite: bool) -> PriorAuthResult<PathBuf> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PriorAuthError::PolicyStore {
            reason: format!("failed to create '{}': {}", parent.display(), e),
        })?;
    }

    if destination.exists() && !overwrite {
        debug!(path = %destination.display(), "policy catalog already present, leaving as is");
        return Ok(destination.to_path_buf());
    }

    let contents = render(&default_policies(), CatalogFormat::for_path(destination))?;
    std::fs::write(destination, contents).map_err(|e| PriorAuthError::PolicyStore {
        reason: format!("failed to write policy catalog '{}': {}", destination.display(), e),
    })?;

    info!(path = %destination.display(), overwrite, "policy catalog written");
    Ok(destination.to_path_buf())
}

/// Write one knowledge-base source document per built-in policy into
/// `directory`, named `<policy_id>.txt` in lower case.
///
/// Existing files are kept unless `overwrite` is set. Returns every document
/// path, written or kept.
pub fn write_policy_documents(directory: &Path, overwrite: bool) -> PriorAuthResult<Vec<PathBuf>> {
    std::fs::create_dir_all(directory).map_err(|e| PriorAuthError::PolicyStore {
        reason: format!("failed to create '{}': {}", directory.display(), e),
    })?;

    let mut paths = Vec::new();
    for record in default_policies() {
        let path = directory.join(format!("{}.txt", record.policy_id.to_lowercase()));
        if path.exists() && !overwrite {
            debug!(path = %path.display(), "policy document already present, leaving as is");
        } else {
            std::fs::write(&path, render_policy_document(&record)).map_err(|e| PriorAuthError::PolicyStore {
                reason: format!("failed to write policy document '{}': {}", path.display(), e),
            })?;
        }
        paths.push(path);
    }

    info!(directory = %directory.display(), documents = paths.len(), "policy documents written");
    Ok(paths)
}

// ── Lazily loaded store ──────────────────────────────────────────────────────

/// Process-wide, read-only policy catalog loaded on first use.
///
/// Shared by reference between runs; nothing mutates it after loading.
#[derive(Debug)]
pub struct PolicyStore {
    path: Option<PathBuf>,
    records: OnceLock<Vec<PolicyRecord>>,
}

impl PolicyStore {
    /// A store backed by the catalog file at `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            records: OnceLock::new(),
        }
    }

    /// A store preloaded with `records`.
    pub fn with_records(records: Vec<PolicyRecord>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(records);
        Self { path: None, records: cell }
    }

    /// A store serving the built-in catalog.
    pub fn builtin() -> Self {
        Self::with_records(default_policies())
    }

    /// The catalog records, loading them on the first call.
    pub fn records(&self) -> &[PolicyRecord] {
        self.records.get_or_init(|| self.load())
    }

    fn load(&self) -> Vec<PolicyRecord> {
        let Some(path) = &self.path else {
            return default_policies();
        };
        if !path.exists() {
            debug!(path = %path.display(), "policy catalog missing, using built-in catalog");
            return default_policies();
        }
        match from_file(path) {
            Ok(records) => {
                info!(path = %path.display(), count = records.len(), "policy catalog loaded");
                records
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "policy catalog unreadable, using built-in catalog");
                default_policies()
            }
        }
    }
}
