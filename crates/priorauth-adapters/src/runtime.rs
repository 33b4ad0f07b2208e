//! Wires a `PipelineConfig` into a ready-to-run `Orchestrator`.
//!
//! This is the only place that reads the process environment, and only for
//! the bearer token named by `reasoning_backend.api_key_env`.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use priorauth_contracts::error::PriorAuthResult;
use priorauth_core::{
    config::{PipelineConfig, SubmissionMode},
    orchestrator::Orchestrator,
    traits::{ReasoningBackend, SubmissionAdapter},
};
use priorauth_policy::{PolicyMatcher, PolicyStore};
use priorauth_reasoning::{
    CodingResolver, CodingSettings, JustificationSettings, Justifier, NecessityEvaluator,
};

use crate::{
    bedrock::{BedrockKnowledgeBase, ConverseClient, DisabledReasoning},
    intake::RegexIntake,
    submission::{DryRunSubmissionAdapter, HttpSubmissionAdapter},
};

/// Build an orchestrator from `config`, reading the API key from the
/// environment variable it names.
pub fn build_orchestrator(config: &PipelineConfig) -> PriorAuthResult<Orchestrator> {
    let api_key = std::env::var(&config.reasoning_backend.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty());
    build_orchestrator_with_key(config, api_key)
}

/// Build an orchestrator from `config` with an explicit API key.
///
/// # Errors
///
/// `ConfigError` when an HTTP client cannot be built or `knowledge_base.kb_id`
/// is set but blank.
pub fn build_orchestrator_with_key(config: &PipelineConfig, api_key: Option<String>) -> PriorAuthResult<Orchestrator> {
    let timeout = Duration::from_secs(config.reasoning_backend.timeout_secs);

    let wants_model = config.coding.use_model || config.justification.use_model;
    let backend: Option<Arc<dyn ReasoningBackend>> = match (wants_model, config.reasoning_backend.enabled) {
        (false, _) => None,
        (true, false) => Some(Arc::new(DisabledReasoning)),
        (true, true) => Some(Arc::new(ConverseClient::new(
            &config.reasoning_backend.endpoint,
            api_key.clone(),
            timeout,
        )?)),
    };

    let coder = match &backend {
        Some(backend) if config.coding.use_model => {
            CodingResolver::with_model(Arc::clone(backend), CodingSettings::from(&config.coding))
        }
        _ => CodingResolver::heuristic_only(),
    };

    let justifier = match &backend {
        Some(backend) if config.justification.use_model => {
            Justifier::with_model(Arc::clone(backend), JustificationSettings::from(&config.justification))
        }
        _ => Justifier::template_only(),
    };

    let store = Arc::new(PolicyStore::from_path(&config.policy_store.path));
    let matcher = match &config.knowledge_base.kb_id {
        Some(kb_id) => {
            let kb = BedrockKnowledgeBase::new(&config.knowledge_base.endpoint, kb_id, api_key, timeout)?;
            PolicyMatcher::with_knowledge_base(store, Box::new(kb), config.knowledge_base.top_k)
        }
        None => PolicyMatcher::local(store),
    };

    let submitter: Box<dyn SubmissionAdapter> = match config.submission.mode {
        SubmissionMode::Http => Box::new(HttpSubmissionAdapter::from_config(&config.submission)?),
        SubmissionMode::DryRun => Box::new(DryRunSubmissionAdapter),
    };

    info!(
        reasoning_backend = backend.as_ref().map_or("none", |b| b.name()),
        coding_model = config.coding.use_model,
        justification_model = config.justification.use_model,
        knowledge_base = config.knowledge_base.kb_id.is_some(),
        submission = ?config.submission.mode,
        "orchestrator assembled"
    );

    Ok(Orchestrator::new(
        Box::new(RegexIntake::default()),
        Box::new(coder),
        Box::new(matcher),
        Box::new(NecessityEvaluator::new(justifier)),
        submitter,
    ))
}
