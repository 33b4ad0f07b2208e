//! Deterministic local policy scoring.
//!
//! Points per candidate policy:
//!
//! | signal                                          | points |
//! |-------------------------------------------------|--------|
//! | policy payer is a substring of the request payer | +7     |
//! | member-id prefix is a listed prefix             | +8     |
//! | procedure code is a covered code                | +4     |
//! | each service keyword found in the service       | +2     |
//!
//! The highest score wins; ties keep the earlier catalog entry.

use priorauth_contracts::policy::PolicyRecord;

use crate::catalog::fallback_policy;

pub const PAYER_POINTS: i64 = 7;
pub const PREFIX_POINTS: i64 = 8;
pub const PROCEDURE_POINTS: i64 = 4;
pub const KEYWORD_POINTS: i64 = 2;

/// The normalized request a policy is scored against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyQuery {
    payer_name: String,
    member_prefix: String,
    procedure_code: String,
    service: String,
}

impl PolicyQuery {
    pub fn new(payer_name: &str, member_id: &str, procedure_code: &str, requested_service: &str) -> Self {
        Self {
            payer_name: payer_name.to_lowercase(),
            member_prefix: member_prefix(member_id),
            procedure_code: procedure_code.trim().to_string(),
            service: requested_service.to_lowercase(),
        }
    }
}

/// The member-id segment before the first `-`, upper-cased.
pub fn member_prefix(member_id: &str) -> String {
    member_id
        .split('-')
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase()
}

pub fn score_policy(policy: &PolicyRecord, query: &PolicyQuery) -> i64 {
    let mut score = 0;

    let policy_payer = policy.payer_name.to_lowercase();
    if !policy_payer.is_empty() && query.payer_name.contains(&policy_payer) {
        score += PAYER_POINTS;
    }

    if !query.member_prefix.is_empty()
        && policy
            .member_prefixes
            .iter()
            .any(|prefix| prefix.to_uppercase() == query.member_prefix)
    {
        score += PREFIX_POINTS;
    }

    if !query.procedure_code.is_empty() && policy.procedure_codes.contains(&query.procedure_code) {
        score += PROCEDURE_POINTS;
    }

    let keyword_hits = policy
        .service_keywords
        .iter()
        .filter(|keyword| query.service.contains(&keyword.to_lowercase()))
        .count() as i64;
    score + keyword_hits * KEYWORD_POINTS
}

/// Pick the best policy from `policies`.
///
/// Scores start from a sentinel of -1, so any policy beats it; the generic
/// default is returned only for an empty catalog.
pub fn select_policy(policies: &[PolicyRecord], query: &PolicyQuery) -> PolicyRecord {
    let mut best: Option<&PolicyRecord> = None;
    let mut best_score = -1;
    for policy in policies {
        let score = score_policy(policy, query);
        if score > best_score {
            best = Some(policy);
            best_score = score;
        }
    }
    best.cloned().unwrap_or_else(fallback_policy)
}
