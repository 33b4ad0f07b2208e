//! The policy matcher: knowledge-base retrieval with local fallback.
//!
//! Strategy selection is fixed at construction. With no knowledge base the
//! matcher scores the local catalog directly (`local`). With one, it queries
//! the knowledge base, parses each passage, and keeps the best-scoring valid
//! parse (`knowledge_base`). Any knowledge-base failure downgrades to the
//! local catalog (`local_fallback`); `retrieve` itself never fails.

use std::sync::Arc;

use tracing::{debug, info, warn};

use priorauth_contracts::{
    capability::KnowledgePassage,
    error::{PriorAuthError, PriorAuthResult},
    policy::{PolicyMatch, PolicyRecord, RetrievalSource},
};
use priorauth_core::traits::{KnowledgeBase, PolicyRetriever};

use crate::{
    catalog::PolicyStore,
    kb_text::parse_policy_document,
    scoring::{select_policy, PolicyQuery},
};

pub const KB_EXACT_PAYER_POINTS: f64 = 10.0;
pub const KB_PARTIAL_PAYER_POINTS: f64 = 4.0;
pub const KB_PROCEDURE_POINTS: f64 = 2.0;
pub const KB_MAX_SERVICE_TOKEN_POINTS: usize = 3;

/// Selects the governing payer policy for a request.
pub struct PolicyMatcher {
    store: Arc<PolicyStore>,
    knowledge_base: Option<Box<dyn KnowledgeBase>>,
    top_k: usize,
}

impl PolicyMatcher {
    /// A matcher that scores only the local catalog.
    pub fn local(store: Arc<PolicyStore>) -> Self {
        Self {
            store,
            knowledge_base: None,
            top_k: 0,
        }
    }

    /// A matcher that asks `knowledge_base` first and falls back to `store`.
    pub fn with_knowledge_base(
        store: Arc<PolicyStore>,
        knowledge_base: Box<dyn KnowledgeBase>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            knowledge_base: Some(knowledge_base),
            top_k: top_k.max(1),
        }
    }

    fn retrieve_local(&self, query: &PolicyQuery, source: RetrievalSource) -> PolicyMatch {
        let selected = select_policy(self.store.records(), query);
        PolicyMatch::from_record(&selected, source)
    }

    fn retrieve_from_knowledge_base(
        &self,
        knowledge_base: &dyn KnowledgeBase,
        payer_name: &str,
        member_id: &str,
        procedure_code: &str,
        requested_service: &str,
    ) -> PriorAuthResult<PolicyMatch> {
        let query = knowledge_base_query(payer_name, member_id, procedure_code, requested_service);
        let passages = knowledge_base.retrieve(&query, self.top_k)?;
        if passages.is_empty() {
            return Err(PriorAuthError::KnowledgeBase {
                reason: "knowledge base returned no passages".to_string(),
            });
        }

        let mut best: Option<(f64, PolicyRecord)> = None;
        for (idx, passage) in passages.iter().enumerate() {
            let record = match parse_policy_document(&passage.text) {
                Ok(record) => record,
                Err(e) => {
                    debug!(passage = idx, error = %e, "skipping unparseable passage");
                    continue;
                }
            };
            let score = score_passage(&record, passage, payer_name, procedure_code, requested_service);
            debug!(passage = idx, policy_id = %record.policy_id, score, "scored passage");
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, record));
            }
        }

        let (score, record) = best.ok_or_else(|| PriorAuthError::KnowledgeBase {
            reason: format!("none of {} passages contained a parseable policy", passages.len()),
        })?;
        info!(policy_id = %record.policy_id, score, "policy selected from knowledge base");
        Ok(PolicyMatch::from_record(&record, RetrievalSource::KnowledgeBase))
    }
}

impl PolicyRetriever for PolicyMatcher {
    fn retrieve(
        &self,
        payer_name: &str,
        member_id: &str,
        procedure_code: &str,
        requested_service: &str,
    ) -> PolicyMatch {
        let query = PolicyQuery::new(payer_name, member_id, procedure_code, requested_service);

        let Some(knowledge_base) = self.knowledge_base.as_deref() else {
            return self.retrieve_local(&query, RetrievalSource::Local);
        };

        match self.retrieve_from_knowledge_base(
            knowledge_base,
            payer_name,
            member_id,
            procedure_code,
            requested_service,
        ) {
            Ok(policy) => policy,
            Err(e) => {
                warn!(error = %e, "knowledge base retrieval failed, scoring local catalog");
                self.retrieve_local(&query, RetrievalSource::LocalFallback)
            }
        }
    }
}

/// Natural-language query sent to the knowledge base.
pub fn knowledge_base_query(
    payer_name: &str,
    member_id: &str,
    procedure_code: &str,
    requested_service: &str,
) -> String {
    format!(
        "Prior authorization medical necessity criteria for payer {} (member {}) covering {} (CPT {}).",
        payer_name, member_id, requested_service, procedure_code
    )
}

/// Score a parsed passage against the request.
///
/// Relevance (when numeric) + payer exact (+10) or substring either way (+4)
/// + procedure code literal in the passage (+2) + requested-service tokens of
/// four or more characters found in the passage, capped at 3.
pub fn score_passage(
    record: &PolicyRecord,
    passage: &KnowledgePassage,
    payer_name: &str,
    procedure_code: &str,
    requested_service: &str,
) -> f64 {
    let mut score = passage.relevance_score.filter(|s| s.is_finite()).unwrap_or(0.0);

    let requested = payer_name.trim().to_lowercase();
    let parsed = record.payer_name.trim().to_lowercase();
    if !requested.is_empty() && !parsed.is_empty() {
        if requested == parsed {
            score += KB_EXACT_PAYER_POINTS;
        } else if requested.contains(&parsed) || parsed.contains(&requested) {
            score += KB_PARTIAL_PAYER_POINTS;
        }
    }

    let text = passage.text.to_lowercase();
    let procedure = procedure_code.trim();
    if !procedure.is_empty() && text.contains(procedure) {
        score += KB_PROCEDURE_POINTS;
    }

    let token_hits = requested_service
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 4 && text.contains(token))
        .count()
        .min(KB_MAX_SERVICE_TOKEN_POINTS);
    score + token_hits as f64
}
