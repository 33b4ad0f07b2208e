//! Portal submission adapters.
//!
//! Both adapters gate on approval first: an unapproved payload comes back as
//! `needs_approval` without touching the portal.

use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use priorauth_contracts::{
    error::{PriorAuthError, PriorAuthResult},
    submission::{FormPayload, SubmissionResult, SubmissionStatus},
};
use priorauth_core::{config::SubmissionConfig, traits::SubmissionAdapter};

const PAUSED_MESSAGE: &str = "Submission paused until clinician approves the pre-filled form.";

/// `PA-` followed by eight upper-case hex characters.
pub fn local_reference() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("PA-{}", hex[..8].to_uppercase())
}

/// The text shown to the clinician before approval.
pub fn review_snapshot(payload: &FormPayload, mode: &str) -> String {
    let field = |key: &str| payload.get(key).map(String::as_str).unwrap_or_default();
    format!(
        "Human Review Snapshot\n\
         - Patient: {}\n\
         - Member ID: {}\n\
         - Payer: {}\n\
         - Diagnosis: {}\n\
         - Procedure: {}\n\
         - Denial Risk: {}\n\
         - Submission Mode: {}",
        field("patient_name"),
        field("member_id"),
        field("payer_name"),
        field("diagnosis_code"),
        field("procedure_code"),
        field("denial_risk_score"),
        mode,
    )
}

fn paused(payload: &FormPayload, review_snapshot: &str, mode: &str) -> SubmissionResult {
    SubmissionResult {
        status: SubmissionStatus::NeedsApproval,
        message: PAUSED_MESSAGE.to_string(),
        reference_id: String::new(),
        review_snapshot: review_snapshot.to_string(),
        payload: payload.clone(),
        mode: mode.to_string(),
    }
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

/// Form-posts approved payloads to `<portal>/submit`.
///
/// Each attempt is a fresh request; after `max_attempts` failures the result
/// is `failed` with the last error in its message. Nothing is raised.
pub struct HttpSubmissionAdapter {
    endpoint: String,
    max_attempts: u32,
    client: reqwest::blocking::Client,
}

impl HttpSubmissionAdapter {
    pub const MODE: &'static str = "http_adapter";

    pub fn new(portal_url: &str, timeout: Duration, max_attempts: u32) -> PriorAuthResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PriorAuthError::ConfigError {
                reason: format!("failed to build portal HTTP client: {}", e),
            })?;
        Ok(Self {
            endpoint: format!("{}/submit", portal_url.trim_end_matches('/')),
            max_attempts: max_attempts.max(1),
            client,
        })
    }

    pub fn from_config(config: &SubmissionConfig) -> PriorAuthResult<Self> {
        Self::new(
            &config.portal_url,
            Duration::from_secs(config.timeout_secs),
            config.max_attempts,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn post_once(&self, payload: &FormPayload) -> Result<Value, reqwest::Error> {
        self.client
            .post(&self.endpoint)
            .form(payload)
            .send()?
            .error_for_status()?
            .json::<Value>()
    }
}

impl SubmissionAdapter for HttpSubmissionAdapter {
    fn generate_review_snapshot(&self, payload: &FormPayload) -> String {
        review_snapshot(payload, Self::MODE)
    }

    fn submit(&self, payload: &FormPayload, approved: bool, review_snapshot: &str) -> SubmissionResult {
        if !approved {
            return paused(payload, review_snapshot, Self::MODE);
        }

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match self.post_once(payload) {
                Ok(body) => {
                    let status = body
                        .get("status")
                        .and_then(Value::as_str)
                        .map_or(SubmissionStatus::Submitted, SubmissionStatus::from_portal);
                    let reference_id = body
                        .get("reference")
                        .and_then(Value::as_str)
                        .map_or_else(local_reference, str::to_string);
                    info!(endpoint = %self.endpoint, attempt, reference = %reference_id, "portal accepted submission");
                    return SubmissionResult {
                        status,
                        message: "Prior authorization submitted via HTTP adapter.".to_string(),
                        reference_id,
                        review_snapshot: review_snapshot.to_string(),
                        payload: payload.clone(),
                        mode: Self::MODE.to_string(),
                    };
                }
                Err(e) => {
                    warn!(endpoint = %self.endpoint, attempt, error = %e, "portal submission attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        SubmissionResult {
            status: SubmissionStatus::Failed,
            message: format!(
                "HTTP adapter failed after {} attempts: {}",
                self.max_attempts, last_error
            ),
            reference_id: String::new(),
            review_snapshot: review_snapshot.to_string(),
            payload: payload.clone(),
            mode: Self::MODE.to_string(),
        }
    }
}

// ── Dry run ───────────────────────────────────────────────────────────────────

/// Accepts approved payloads locally and mints a reference id.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSubmissionAdapter;

impl DryRunSubmissionAdapter {
    pub const MODE: &'static str = "dry_run";
}

impl SubmissionAdapter for DryRunSubmissionAdapter {
    fn generate_review_snapshot(&self, payload: &FormPayload) -> String {
        review_snapshot(payload, Self::MODE)
    }

    fn submit(&self, payload: &FormPayload, approved: bool, review_snapshot: &str) -> SubmissionResult {
        if !approved {
            return paused(payload, review_snapshot, Self::MODE);
        }
        let reference_id = local_reference();
        info!(reference = %reference_id, "dry-run submission recorded");
        SubmissionResult {
            status: SubmissionStatus::Submitted,
            message: "Prior authorization recorded locally (dry run).".to_string(),
            reference_id,
            review_snapshot: review_snapshot.to_string(),
            payload: payload.clone(),
            mode: Self::MODE.to_string(),
        }
    }
}
