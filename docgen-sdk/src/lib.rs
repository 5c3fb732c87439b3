//! # docgen-sdk
//!
//! Turns an unreliable text-generating upstream into a dependable producer
//! of versioned exam-paper documents.
//!
//! This crate provides:
//!
//! - Resilience patterns for the upstream (circuit breaker, retries, deadline)
//! - A recovery pipeline that repairs malformed structured output
//! - Validation and repair of the recovered document tree
//! - Non-destructive reconciliation of the result into the caller's versions
//!
//! ## Architecture
//!
//! - `GenerationService`: the single upstream operation, implemented by `OpenAIClient`
//! - `Resilience`: breaker + retry + deadline around each logical call
//! - `ResponseNormalizer`: ordered repair cascade with a flagged fallback
//! - `DocumentValidator`: typed project with synthesized structural metadata
//! - `VersionReconciler`: edit / copy / translate merge with invariant checks
//! - `DocumentEngine`: runs the stages for one `GenerationRequest`

pub mod core;
pub use core::{GenerationPrompt, GenerationService, ServiceClient};

pub mod model;
pub use model::{
    AttachedFile, Document, GenerationRequest, GenerationResponse, Header, HeaderField, Project,
    Question,
};

pub mod services;
pub use services::openai;

pub mod error;
pub use error::{EngineError, ErrorContext, ErrorOutcome, Result};

pub mod resilience;
pub use resilience::{CircuitBreaker, CircuitBreakerStatus, Resilience, RetryExecutor};

pub mod config;
pub use config::{ConfigProvider, EngineConfig, ServiceConfig, UpstreamConfig};

pub mod normalizer;
pub use normalizer::{NormalizedResponse, RecoveryStrategy, ResponseNormalizer};

pub mod validator;
pub use validator::DocumentValidator;

pub mod reconcile;
pub use reconcile::{Intent, Language, VersionReconciler};

mod engine;
pub use engine::DocumentEngine;

// Utility module for common functionality
mod util;

#[cfg(test)]
mod tests;

/// Create an OpenAI client configured from the environment
pub fn openai_client() -> Result<services::openai::OpenAIClient> {
    services::openai::OpenAIClient::from_env()
}
