//! # priorauth-contracts
//!
//! Shared types and the error taxonomy for the prior-authorization pipeline.
//!
//! Every crate in the workspace imports from here. No business logic lives in
//! this crate, only data definitions, serialization shapes, and errors.

pub mod capability;
pub mod clinical;
pub mod coding;
pub mod error;
pub mod necessity;
pub mod policy;
pub mod submission;
pub mod workflow;
