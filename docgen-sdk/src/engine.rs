//! Document engine
//!
//! Runs one generation request end to end: request checks, the guarded
//! upstream call, response recovery, validation and version reconciliation.
//! Nothing from the caller's project is changed unless every stage succeeds.

use log::{info, warn};
use tracing::Instrument;

use crate::config::{EngineConfig, DEFAULT_PROVIDER};
use crate::core::{GenerationPrompt, GenerationService};
use crate::error::{EngineError, Result};
use crate::model::{GenerationRequest, GenerationResponse, Project};
use crate::normalizer::{ResponseNormalizer, FALLBACK_ANSWER};
use crate::reconcile::{classify, VersionReconciler};
use crate::resilience::{CircuitBreakerStatus, Resilience};
use crate::services::OpenAIClient;
use crate::util::{generate_request_id, sanitize_for_logging, truncate_string};
use crate::validator::DocumentValidator;

/// The generation resilience and reconciliation engine
pub struct DocumentEngine<S> {
    service: S,
    config: EngineConfig,
    resilience: Resilience,
    normalizer: ResponseNormalizer,
    validator: DocumentValidator,
    reconciler: VersionReconciler,
}

impl DocumentEngine<OpenAIClient> {
    /// Build an engine around the OpenAI client, configured from the environment
    pub fn from_env() -> Result<Self> {
        let config = EngineConfig::from_provider(&**DEFAULT_PROVIDER)?;
        Ok(Self::new(OpenAIClient::from_env()?, config))
    }
}

impl<S: GenerationService> DocumentEngine<S> {
    /// Create an engine with its own circuit breaker
    pub fn new(service: S, config: EngineConfig) -> Self {
        let resilience = Resilience::from_engine_config(&config);
        Self::with_resilience(service, config, resilience)
    }

    /// Create an engine around an existing resilience facade
    pub fn with_resilience(service: S, config: EngineConfig, resilience: Resilience) -> Self {
        Self {
            service,
            config,
            resilience,
            normalizer: ResponseNormalizer::new(),
            validator: DocumentValidator::new(),
            reconciler: VersionReconciler::new(),
        }
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The wrapped upstream
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Current circuit breaker status
    pub fn circuit_breaker_status(&self) -> CircuitBreakerStatus {
        self.resilience.circuit_breaker_status()
    }

    /// Close the circuit breaker and clear its failure count
    pub fn reset_circuit_breaker(&self) {
        self.resilience.reset_circuit_breaker();
    }

    /// Process one request
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let request_id = generate_request_id();
        let span = tracing::info_span!("generate", request_id = %request_id);

        async move {
            let result = self.run(&request).await;
            if let Err(err) = &result {
                warn!(
                    "Request {} failed with {}: {}",
                    request_id,
                    err.outcome(),
                    sanitize_for_logging(&err.to_string())
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        check_request(request)?;

        let intent = classify(&request.instruction_text);
        info!(
            "Generating ({}) for instruction: {}",
            intent,
            truncate_string(&sanitize_for_logging(&request.instruction_text), 120)
        );

        let prompt = self.build_prompt(request)?;
        let raw = self
            .resilience
            .execute(|| self.service.generate(&prompt))
            .await?;

        let normalized = self.normalizer.normalize(&raw);

        if normalized.used_fallback {
            warn!("Upstream output was unreadable, answering with the fallback template");
            let project = match &request.project {
                Some(original) => original.clone(),
                None => self.validator.validate(&normalized.project)?,
            };
            return Ok(GenerationResponse {
                answer: FALLBACK_ANSWER.to_string(),
                project,
                used_fallback_template: true,
                translation_warning: None,
            });
        }

        let candidate = self.validator.validate(&normalized.project)?;

        let reconciled = self.reconciler.reconcile(
            intent,
            candidate,
            request.project.as_ref(),
            request.active_content_index,
        )?;

        Ok(GenerationResponse {
            answer: normalized.answer,
            project: reconciled.project,
            used_fallback_template: false,
            translation_warning: reconciled.translation_warning,
        })
    }

    fn build_prompt(&self, request: &GenerationRequest) -> Result<GenerationPrompt> {
        let mut prompt = GenerationPrompt::new(
            self.config.system_context.clone(),
            request.instruction_text.clone(),
        );

        if let Some(project) = &request.project {
            prompt = prompt.with_project_text(serde_json::to_string(project)?);
        }
        if let Some(file) = &request.attached_file {
            prompt = prompt.with_attachment(file.clone());
        }

        Ok(prompt)
    }
}

impl<S> std::fmt::Debug for DocumentEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentEngine")
            .field("config", &self.config)
            .field("circuit_breaker", &self.resilience.circuit_breaker_status())
            .finish()
    }
}

fn check_request(request: &GenerationRequest) -> Result<()> {
    if request.instruction_text.trim().is_empty() {
        return Err(EngineError::invalid_request("instructionText must not be empty"));
    }

    if let Some(project) = &request.project {
        check_project(project, request.active_content_index)?;
    }

    Ok(())
}

fn check_project(project: &Project, active_index: usize) -> Result<()> {
    if project.version_count() == 0 {
        return Err(EngineError::invalid_request("project must hold at least one version"));
    }
    if project.version(active_index).is_none() {
        return Err(EngineError::invalid_request(format!(
            "activeContentIndex {} is outside a project with {} versions",
            active_index,
            project.version_count()
        )));
    }
    Ok(())
}
