//! # priorauth-adapters
//!
//! Concrete collaborators for the prior-authorization pipeline and the
//! builder that assembles them from configuration.
//!
//! - [`intake`]: `RegexIntake`, transcript → `ExtractedClinicalData`
//! - [`submission`]: HTTP portal and dry-run `SubmissionAdapter`s
//! - [`bedrock`]: HTTP reasoning and knowledge-base clients plus offline
//!   stand-ins
//! - [`runtime`]: `build_orchestrator`, config → `Orchestrator`
//! - [`fixtures`]: sample transcript and policy document

pub mod bedrock;
pub mod fixtures;
pub mod intake;
pub mod runtime;
pub mod submission;

pub use bedrock::{BedrockKnowledgeBase, ConverseClient, DisabledReasoning, StaticKnowledgeBase};
pub use intake::RegexIntake;
pub use runtime::{build_orchestrator, build_orchestrator_with_key};
pub use submission::{DryRunSubmissionAdapter, HttpSubmissionAdapter};
