//! Request and response shapes for the optional external capabilities.
//!
//! The reasoning and knowledge-base capabilities are modeled as plain data so
//! the pipeline never depends on a particular vendor client.

use serde::{Deserialize, Serialize};

/// Opt-in extended reasoning for a reasoning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedReasoning {
    /// Token budget the model may spend on hidden reasoning.
    pub budget_tokens: u32,
}

/// One call to a text-generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub extended_reasoning: Option<ExtendedReasoning>,
}

/// The model's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningResponse {
    /// Concatenated assistant text.
    pub text: String,
}

/// A passage returned by a knowledge-base lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePassage {
    pub text: String,
    /// Retriever relevance score, when the backend reports one.
    pub relevance_score: Option<f64>,
}
