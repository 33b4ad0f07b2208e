//! HTTP capability clients for Bedrock, plus their offline stand-ins.
//!
//! - `ConverseClient` speaks the runtime `converse` request shape.
//! - `BedrockKnowledgeBase` speaks the agent-runtime `retrieve` shape.
//! - `DisabledReasoning` and `StaticKnowledgeBase` need no network.
//!
//! Every transport, status, or decoding failure maps to
//! `CapabilityFailed`; a well-formed reply with no usable text maps to
//! `MalformedOutput`.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use priorauth_contracts::{
    capability::{KnowledgePassage, ReasoningRequest, ReasoningResponse},
    error::{PriorAuthError, PriorAuthResult},
};
use priorauth_core::traits::{KnowledgeBase, ReasoningBackend};

fn http_client(timeout: Duration) -> PriorAuthResult<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PriorAuthError::ConfigError {
            reason: format!("failed to build HTTP client: {}", e),
        })
}

fn post_json(
    client: &reqwest::blocking::Client,
    url: &str,
    api_key: Option<&str>,
    body: &Value,
    capability: &str,
) -> PriorAuthResult<Value> {
    let failed = |reason: String| PriorAuthError::CapabilityFailed {
        capability: capability.to_string(),
        reason,
    };
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    request
        .send()
        .map_err(|e| failed(format!("request failed: {}", e)))?
        .error_for_status()
        .map_err(|e| failed(format!("bad status: {}", e)))?
        .json::<Value>()
        .map_err(|e| failed(format!("invalid JSON body: {}", e)))
}

// ── Reasoning ─────────────────────────────────────────────────────────────────

/// JSON body of a `converse` call.
pub fn converse_body(request: &ReasoningRequest) -> Value {
    let mut body = json!({
        "system": [{ "text": request.system_prompt }],
        "messages": [{
            "role": "user",
            "content": [{ "text": request.user_prompt }],
        }],
        "inferenceConfig": {
            "maxTokens": request.max_tokens,
            "temperature": request.temperature,
        },
    });
    if let Some(extended) = request.extended_reasoning {
        body["additionalModelRequestFields"] = json!({
            "reasoningConfig": {
                "type": "enabled",
                "budgetTokens": extended.budget_tokens,
            }
        });
    }
    body
}

/// Concatenated `output.message.content[].text` of a `converse` reply.
pub fn converse_text(reply: &Value) -> PriorAuthResult<String> {
    let content = reply
        .pointer("/output/message/content")
        .and_then(Value::as_array)
        .ok_or_else(|| PriorAuthError::MalformedOutput {
            reason: "converse reply has no output.message.content".to_string(),
        })?;
    let text: String = content
        .iter()
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err(PriorAuthError::MalformedOutput {
            reason: "converse reply contained no text blocks".to_string(),
        });
    }
    Ok(text)
}

/// `ReasoningBackend` over the Bedrock runtime `converse` endpoint.
pub struct ConverseClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl ConverseClient {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> PriorAuthResult<Self> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client: http_client(timeout)?,
        })
    }
}

impl ReasoningBackend for ConverseClient {
    fn name(&self) -> &str {
        "bedrock-converse"
    }

    fn invoke(&self, request: &ReasoningRequest) -> PriorAuthResult<ReasoningResponse> {
        let url = format!("{}/model/{}/converse", self.endpoint, request.model_id);
        debug!(
            model_id = %request.model_id,
            extended = request.extended_reasoning.is_some(),
            "invoking converse"
        );
        let reply = post_json(&self.client, &url, self.api_key.as_deref(), &converse_body(request), self.name())?;
        Ok(ReasoningResponse {
            text: converse_text(&reply)?,
        })
    }
}

/// A reasoning backend that is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledReasoning;

impl ReasoningBackend for DisabledReasoning {
    fn name(&self) -> &str {
        "disabled"
    }

    fn invoke(&self, _request: &ReasoningRequest) -> PriorAuthResult<ReasoningResponse> {
        Err(PriorAuthError::CapabilityDisabled {
            capability: "reasoning".to_string(),
        })
    }
}

// ── Knowledge base ────────────────────────────────────────────────────────────

pub fn retrieve_body(query: &str, top_k: usize) -> Value {
    json!({
        "retrievalQuery": { "text": query },
        "retrievalConfiguration": {
            "vectorSearchConfiguration": { "numberOfResults": top_k }
        }
    })
}

/// Passages from `retrievalResults[]`. Results without text are skipped.
pub fn retrieve_passages(reply: &Value) -> Vec<KnowledgePassage> {
    reply
        .get("retrievalResults")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|result| {
                    let text = result.pointer("/content/text").and_then(Value::as_str)?;
                    Some(KnowledgePassage {
                        text: text.to_string(),
                        relevance_score: result.get("score").and_then(Value::as_f64),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `KnowledgeBase` over the Bedrock agent-runtime `retrieve` endpoint.
pub struct BedrockKnowledgeBase {
    url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for BedrockKnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockKnowledgeBase")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl BedrockKnowledgeBase {
    pub fn new(endpoint: &str, kb_id: &str, api_key: Option<String>, timeout: Duration) -> PriorAuthResult<Self> {
        if kb_id.trim().is_empty() {
            return Err(PriorAuthError::ConfigError {
                reason: "knowledge_base.kb_id is empty".to_string(),
            });
        }
        Ok(Self {
            url: format!("{}/knowledgebases/{}/retrieve", endpoint.trim_end_matches('/'), kb_id.trim()),
            api_key,
            client: http_client(timeout)?,
        })
    }
}

impl KnowledgeBase for BedrockKnowledgeBase {
    fn retrieve(&self, query: &str, top_k: usize) -> PriorAuthResult<Vec<KnowledgePassage>> {
        let reply = post_json(
            &self.client,
            &self.url,
            self.api_key.as_deref(),
            &retrieve_body(query, top_k),
            "knowledge_base",
        )?;
        let passages = retrieve_passages(&reply);
        debug!(url = %self.url, passages = passages.len(), "knowledge base retrieve");
        Ok(passages)
    }
}

/// A fixed set of passages, returned for every query.
#[derive(Debug, Clone, Default)]
pub struct StaticKnowledgeBase {
    passages: Vec<KnowledgePassage>,
}

impl StaticKnowledgeBase {
    pub fn new(passages: Vec<KnowledgePassage>) -> Self {
        Self { passages }
    }

    /// One unscored passage per document.
    pub fn from_documents<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            documents
                .into_iter()
                .map(|text| KnowledgePassage {
                    text: text.into(),
                    relevance_score: None,
                })
                .collect(),
        )
    }
}

impl KnowledgeBase for StaticKnowledgeBase {
    fn retrieve(&self, _query: &str, top_k: usize) -> PriorAuthResult<Vec<KnowledgePassage>> {
        Ok(self.passages.iter().take(top_k).cloned().collect())
    }
}
