//! # priorauth-core
//!
//! The stage traits, pipeline configuration, and the workflow orchestrator.
//!
//! ## Pipeline
//!
//! `Orchestrator::run` drives a transcript through eight fixed stages and
//! returns a `PriorAuthWorkflowResult` carrying an append-only trace. Stage
//! components are injected as trait objects (see [`traits`]); none of the
//! logic in this crate performs I/O.

pub mod config;
pub mod orchestrator;
pub mod payload;
pub mod traits;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use priorauth_contracts::{
        clinical::ExtractedClinicalData,
        coding::CodingResult,
        error::PriorAuthError,
        necessity::NecessityDecision,
        policy::{PolicyMatch, RetrievalSource},
    };

    use crate::config::{PipelineConfig, SubmissionMode, DEFAULT_MODEL_ID};
    use crate::payload::build_form_payload;

    // ── Configuration ────────────────────────────────────────────────────────

    #[test]
    fn empty_config_is_all_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(!config.coding.use_model);
        assert!(config.knowledge_base.kb_id.is_none());
        assert_eq!(config.knowledge_base.top_k, 5);
        assert_eq!(config.submission.mode, SubmissionMode::DryRun);
        assert_eq!(config.submission.max_attempts, 3);
        assert_eq!(config.submission.timeout_secs, 10);
        assert_eq!(config.coding.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.policy_store.path, PathBuf::from("policies/policies.json"));
        assert_eq!(config.runs.max_runs, 100);
        assert_eq!(config.runs.heartbeat_secs, 20);
        assert!(config.reasoning_backend.enabled);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let toml = r#"
            [coding]
            use_model = true
            require_success = true

            [knowledge_base]
            kb_id = "KB12345"

            [submission]
            mode = "http"
            portal_url = "http://portal.test"
        "#;
        let config = PipelineConfig::from_toml_str(toml).unwrap();
        assert!(config.coding.use_model);
        assert!(config.coding.require_success);
        assert_eq!(config.coding.max_tokens, 400);
        assert_eq!(config.knowledge_base.kb_id.as_deref(), Some("KB12345"));
        assert_eq!(config.submission.mode, SubmissionMode::Http);
        assert_eq!(config.submission.portal_url, "http://portal.test");
        assert_eq!(config.submission.max_attempts, 3);
        assert!(!config.justification.use_model);
        assert!(config.reasoning_backend.enabled);
    }

    #[test]
    fn malformed_config_is_config_error() {
        let err = PipelineConfig::from_toml_str("[coding]\nuse_model = \"sometimes\"").unwrap_err();
        assert!(matches!(err, PriorAuthError::ConfigError { .. }), "got {:?}", err);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = PipelineConfig::from_toml_str("[submission]\nmax_attempts = 0").unwrap_err();
        match err {
            PriorAuthError::ConfigError { reason } => assert!(reason.contains("max_attempts")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let err = PipelineConfig::from_file(std::path::Path::new("/nonexistent/priorauth.toml"))
            .unwrap_err();
        assert!(matches!(err, PriorAuthError::ConfigError { .. }));
    }

    // ── Form payload ─────────────────────────────────────────────────────────

    fn payload_inputs(patient: &str) -> (ExtractedClinicalData, CodingResult, NecessityDecision, PolicyMatch) {
        let extracted = ExtractedClinicalData {
            patient_name: patient.into(),
            date_of_birth: "1965-03-15".into(),
            member_id: "UHC-4429871".into(),
            payer_name: "UnitedHealthcare".into(),
            provider_npi: "1234567890".into(),
            requested_service: "MRI lumbar spine without contrast".into(),
            facility_name: "Demo Outpatient Center".into(),
            urgency: "routine".into(),
            ..Default::default()
        };
        let coding = CodingResult {
            diagnosis_code: "M54.17".into(),
            procedure_code: "72148".into(),
            confidence: 0.92,
            rationale: String::new(),
            source: "heuristic".into(),
        };
        let necessity = NecessityDecision {
            meets_criteria: true,
            satisfied_criteria: vec![],
            missing_criteria: vec![],
            missing_documents: vec![],
            denial_risk_score: 0.1,
            clinical_justification: "Per policy.".into(),
            extended_reasoning_used: false,
        };
        let policy = PolicyMatch {
            policy_id: "UHC-LUMBAR-MRI-2026".into(),
            payer_name: "UnitedHealthcare".into(),
            title: "T".into(),
            criteria: vec![],
            minimum_criteria: 1,
            required_documents: vec![],
            denial_patterns: vec![],
            source: RetrievalSource::Local,
        };
        (extracted, coding, necessity, policy)
    }

    #[test]
    fn payload_has_all_fields_and_formats_risk() {
        let (extracted, coding, necessity, policy) = payload_inputs("Jane Doe");
        let payload = build_form_payload(&extracted, &coding, &necessity, &policy);

        assert_eq!(payload.len(), 13);
        assert_eq!(payload["patient_name"], "Jane Doe");
        assert_eq!(payload["diagnosis_code"], "M54.17");
        assert_eq!(payload["procedure_code"], "72148");
        assert_eq!(payload["policy_id"], "UHC-LUMBAR-MRI-2026");
        assert_eq!(payload["denial_risk_score"], "0.10");
        assert_eq!(payload["clinical_justification"], "Per policy.");
    }

    #[test]
    fn payload_copies_justification_verbatim() {
        let (extracted, coding, mut necessity, policy) = payload_inputs("Jane Doe");
        necessity.clinical_justification = "  Per policy.\n".to_string();
        necessity.denial_risk_score = 0.456;
        let payload = build_form_payload(&extracted, &coding, &necessity, &policy);
        assert_eq!(payload["clinical_justification"], "  Per policy.\n");
        assert_eq!(payload["denial_risk_score"], "0.46");
    }

    #[test]
    fn payload_fields_iterate_in_key_order() {
        let (extracted, coding, necessity, policy) = payload_inputs("Jane Doe");
        let payload = build_form_payload(&extracted, &coding, &necessity, &policy);

        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        assert_eq!(keys.first(), Some(&"clinical_justification"));
        assert_eq!(keys.last(), Some(&"urgency"));
    }

    #[test]
    fn payload_names_unknown_patient() {
        let (extracted, coding, necessity, policy) = payload_inputs("  ");
        let payload = build_form_payload(&extracted, &coding, &necessity, &policy);
        assert_eq!(payload["patient_name"], "Unknown Patient");
    }
}
