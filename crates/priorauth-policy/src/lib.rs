//! # priorauth-policy
//!
//! Payer policy catalog and policy selection.
//!
//! - [`catalog`]: built-in catalog, JSON/TOML loading, bootstrap, knowledge-base
//!   source documents, lazy store
//! - [`scoring`]: deterministic local scoring
//! - [`kb_text`]: parser for free-text knowledge-base policy passages
//! - [`matcher`]: `PolicyMatcher`, the `PolicyRetriever` implementation
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use priorauth_policy::{catalog::PolicyStore, matcher::PolicyMatcher};
//!
//! let matcher = PolicyMatcher::local(Arc::new(PolicyStore::from_path("policies/policies.json")));
//! let policy = matcher.retrieve("UnitedHealthcare", "UHC-4429871", "72148", "MRI lumbar spine");
//! ```

pub mod catalog;
pub mod kb_text;
pub mod matcher;
pub mod scoring;

pub use catalog::PolicyStore;
pub use kb_text::{parse_policy_document, render_policy_document};
pub use matcher::PolicyMatcher;
