//! Pipeline configuration.
//!
//! `PipelineConfig` is deserialized from TOML. Every field has a default, and
//! a missing table means "all defaults", so an empty document is a valid
//! configuration that runs the fully deterministic pipeline.
//!
//! ```toml
//! [coding]
//! use_model = true
//!
//! [knowledge_base]
//! kb_id = "KB12345"
//!
//! [submission]
//! mode = "http"
//! portal_url = "http://localhost:8000"
//! ```
//!
//! Capability selection happens once, at construction, from this struct.
//! Core logic never inspects the process environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use priorauth_contracts::error::{PriorAuthError, PriorAuthResult};

/// Default text model used for coding and justification.
pub const DEFAULT_MODEL_ID: &str = "amazon.nova-lite-v1:0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub policy_store: PolicyStoreConfig,
    pub coding: CodingConfig,
    pub justification: JustificationConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub reasoning_backend: ReasoningBackendConfig,
    pub submission: SubmissionConfig,
    pub runs: RunsConfig,
}

impl PipelineConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `PriorAuthError::ConfigError` for malformed TOML or values of
    /// the wrong type.
    pub fn from_toml_str(s: &str) -> PriorAuthResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| PriorAuthError::ConfigError {
            reason: format!("failed to parse pipeline TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the TOML file at `path`.
    pub fn from_file(path: &Path) -> PriorAuthResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PriorAuthError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> PriorAuthResult<()> {
        if self.submission.max_attempts == 0 {
            return Err(PriorAuthError::ConfigError {
                reason: "submission.max_attempts must be at least 1".to_string(),
            });
        }
        if self.runs.max_runs == 0 || self.runs.heartbeat_secs == 0 {
            return Err(PriorAuthError::ConfigError {
                reason: "runs.max_runs and runs.heartbeat_secs must be at least 1".to_string(),
            });
        }
        if self.knowledge_base.top_k == 0 {
            return Err(PriorAuthError::ConfigError {
                reason: "knowledge_base.top_k must be at least 1".to_string(),
            });
        }
        for (section, temperature) in [
            ("coding", self.coding.temperature),
            ("justification", self.justification.temperature),
        ] {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(PriorAuthError::ConfigError {
                    reason: format!("{}.temperature must be within [0, 1], got {}", section, temperature),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyStoreConfig {
    /// JSON or TOML catalog; a missing file falls back to the built-in catalog.
    pub path: PathBuf,
}

impl Default for PolicyStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("policies/policies.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodingConfig {
    /// Ask the reasoning backend for codes before falling back to heuristics.
    pub use_model: bool,
    /// Propagate model failures instead of falling back.
    pub require_success: bool,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CodingConfig {
    fn default() -> Self {
        Self {
            use_model: false,
            require_success: false,
            model_id: DEFAULT_MODEL_ID.to_string(),
            max_tokens: 400,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JustificationConfig {
    pub use_model: bool,
    pub require_success: bool,
    /// Try the extended-reasoning request before the plain one.
    pub extended_reasoning: bool,
    pub reasoning_budget_tokens: u32,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for JustificationConfig {
    fn default() -> Self {
        Self {
            use_model: false,
            require_success: false,
            extended_reasoning: false,
            reasoning_budget_tokens: 2048,
            model_id: DEFAULT_MODEL_ID.to_string(),
            max_tokens: 600,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    /// Knowledge-base identifier. `None` selects local scoring.
    pub kb_id: Option<String>,
    pub top_k: usize,
    pub endpoint: String,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            kb_id: None,
            top_k: 5,
            endpoint: "https://bedrock-agent-runtime.us-east-1.amazonaws.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningBackendConfig {
    /// When false, model-backed stages get a backend that always reports
    /// `capability_disabled` and fall through to their offline strategy.
    pub enabled: bool,
    pub endpoint: String,
    /// Name of the environment variable holding the bearer token. Read by the
    /// runtime builder, never by pipeline logic.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ReasoningBackendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://bedrock-runtime.us-east-1.amazonaws.com".to_string(),
            api_key_env: "AWS_BEARER_TOKEN_BEDROCK".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// Form-post to the portal's `/submit` endpoint.
    Http,
    /// Accept approved payloads locally and mint a reference id.
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub mode: SubmissionMode,
    pub portal_url: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            mode: SubmissionMode::DryRun,
            portal_url: "http://localhost:8000".to_string(),
            timeout_secs: 10,
            max_attempts: 3,
        }
    }
}

/// Run registry retention and subscriber keep-alive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunsConfig {
    pub max_runs: usize,
    pub heartbeat_secs: u64,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            max_runs: 100,
            heartbeat_secs: 20,
        }
    }
}
