//! Core abstractions for the document engine
//!
//! - `ServiceClient`: identity and health of an upstream client
//! - `GenerationService`: the single upstream operation the engine depends on
//! - `GenerationPrompt`: everything sent to the upstream for one call

use async_trait::async_trait;

use crate::error::Result;
use crate::model::AttachedFile;

/// Base trait for all upstream clients
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// The client name/identifier
    fn name(&self) -> &str;

    /// The base URL for the service
    fn base_url(&self) -> &str;

    /// Health check for the service
    async fn health_check(&self) -> Result<bool>;
}

/// Inputs for one generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPrompt {
    /// Standing instructions describing the document format
    pub system_context: String,

    /// The caller's free-text instruction
    pub instruction: String,

    /// The caller's project serialized as JSON, if one was supplied
    pub project_text: Option<String>,

    /// Optional source material
    pub attached_file: Option<AttachedFile>,
}

impl GenerationPrompt {
    pub fn new(system_context: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            system_context: system_context.into(),
            instruction: instruction.into(),
            project_text: None,
            attached_file: None,
        }
    }

    pub fn with_project_text(mut self, project_text: impl Into<String>) -> Self {
        self.project_text = Some(project_text.into());
        self
    }

    pub fn with_attachment(mut self, file: AttachedFile) -> Self {
        self.attached_file = Some(file);
        self
    }
}

/// The external text generator. Returns raw, possibly malformed text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String>;
}
