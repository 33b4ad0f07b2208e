//! Error taxonomy for the prior-authorization pipeline.
//!
//! Every fallible operation returns `PriorAuthResult<T>`. Capability failures
//! are normally caught by the stage that invoked the capability and folded
//! into a fallback; they only surface to callers in strict mode.

use thiserror::Error;

/// The unified error type for the pipeline crates.
#[derive(Debug, Error)]
pub enum PriorAuthError {
    /// An optional external capability was invoked but is not configured.
    #[error("capability '{capability}' is disabled")]
    CapabilityDisabled { capability: String },

    /// An external capability was invoked and failed (network, auth, quota).
    #[error("capability '{capability}' failed: {reason}")]
    CapabilityFailed { capability: String, reason: String },

    /// An external capability answered, but its output could not be accepted.
    #[error("malformed capability output: {reason}")]
    MalformedOutput { reason: String },

    /// Knowledge-base retrieval produced nothing usable.
    #[error("knowledge base retrieval failed: {reason}")]
    KnowledgeBase { reason: String },

    /// The policy catalog could not be read or written.
    #[error("policy store error: {reason}")]
    PolicyStore { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The intake collaborator could not turn a transcript into clinical data.
    #[error("intake failed: {reason}")]
    Intake { reason: String },

    /// The run registry rejected an operation.
    #[error("run registry error: {reason}")]
    RunRegistry { reason: String },
}

impl PriorAuthError {
    /// Stable snake_case tag naming the failure class.
    ///
    /// Used to annotate rationale and justification text when a stage falls
    /// back, so the provenance of a decision is visible without the full
    /// error message.
    pub fn class(&self) -> &'static str {
        match self {
            Self::CapabilityDisabled { .. } => "capability_disabled",
            Self::CapabilityFailed { .. } => "capability_failed",
            Self::MalformedOutput { .. } => "malformed_output",
            Self::KnowledgeBase { .. } => "knowledge_base",
            Self::PolicyStore { .. } => "policy_store",
            Self::ConfigError { .. } => "config_error",
            Self::Intake { .. } => "intake",
            Self::RunRegistry { .. } => "run_registry",
        }
    }
}

/// Convenience alias used throughout the pipeline crates.
pub type PriorAuthResult<T> = Result<T, PriorAuthError>;
