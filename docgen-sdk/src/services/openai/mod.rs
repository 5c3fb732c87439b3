//! OpenAI chat-completions client
//!
//! Implements `GenerationService` on top of the chat-completions endpoint.
//! Resilience is not applied here; the engine wraps every call.

mod models;
pub use models::*;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, warn};
use reqwest::Client;

use crate::config::{ServiceConfig, UpstreamConfig, DEFAULT_PROVIDER};
use crate::core::{GenerationPrompt, GenerationService, ServiceClient};
use crate::error::{EngineError, Result};
use crate::model::AttachedFile;
use crate::services::common::{build_http_client, parse_error_response, UserAgent};
use crate::util::{measure_time_async, sanitize_for_logging, truncate_string};

const SERVICE_NAME: &str = "openai";
const CHAT_ENDPOINT: &str = "chat/completions";

/// OpenAI API client
pub struct OpenAIClient {
    http_client: Client,
    config: UpstreamConfig,
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl OpenAIClient {
    /// Create a client from validated settings
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        config.validate()?;

        let http_client = build_http_client(
            Some(UserAgent {
                extra: Some("openai".to_string()),
                ..UserAgent::default()
            }),
            Some(std::time::Duration::from_secs(config.timeout_seconds)),
        )?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Create a client from `DOCGEN_OPENAI_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(UpstreamConfig::from_provider(&**DEFAULT_PROVIDER)?)
    }

    /// Create a new builder for the OpenAI client
    pub fn builder() -> OpenAIClientBuilder {
        OpenAIClientBuilder::default()
    }

    /// Settings in use
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// Send a chat completion request
    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let url = self.url(CHAT_ENDPOINT);
        debug!("Sending request to OpenAI: POST {}", url);

        let (response, elapsed) = measure_time_async(|| {
            self.http_client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(request)
                .send()
        })
        .await;

        let response = response.map_err(|e| {
            EngineError::from(e).with_context_value("endpoint", CHAT_ENDPOINT)
        })?;
        debug!("OpenAI responded {} in {:?}", response.status(), elapsed);

        if !response.status().is_success() {
            let error = parse_error_response(SERVICE_NAME, CHAT_ENDPOINT, response).await;
            warn!("OpenAI request failed: {}", sanitize_for_logging(&error.to_string()));
            return Err(error);
        }

        response.json::<ChatCompletionResponse>().await.map_err(|e| {
            EngineError::parsing(format!("Failed to parse chat completion: {}", e))
        })
    }

    /// Build the chat request for a generation prompt
    pub fn build_request(&self, prompt: &GenerationPrompt) -> ChatCompletionRequest {
        let mut messages = vec![ChatMessage::system(prompt.system_context.clone())];

        if let Some(project_text) = &prompt.project_text {
            messages.push(ChatMessage::user(format!("Current project:\n{}", project_text)));
        }

        match &prompt.attached_file {
            Some(file) => messages.push(ChatMessage::user_parts(vec![
                ContentPart::Text {
                    text: prompt.instruction.clone(),
                },
                attachment_part(file),
            ])),
            None => messages.push(ChatMessage::user(prompt.instruction.clone())),
        }

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            response_format: Some(ResponseFormat::json_object()),
            ..Default::default()
        }
    }
}

fn attachment_part(file: &AttachedFile) -> ContentPart {
    if file.is_text() {
        return ContentPart::Text {
            text: format!(
                "Attached file ({}):\n{}",
                file.media_type,
                String::from_utf8_lossy(&file.bytes)
            ),
        };
    }

    let data_url = format!("data:{};base64,{}", file.media_type, STANDARD.encode(&file.bytes));
    if file.media_type.starts_with("image/") {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: data_url },
        }
    } else {
        let extension = file.media_type.rsplit('/').next().unwrap_or("bin");
        ContentPart::File {
            file: FileData {
                filename: format!("attachment.{}", extension),
                file_data: data_url,
            },
        }
    }
}

#[async_trait]
impl ServiceClient for OpenAIClient {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .http_client
            .get(self.url("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await;

        match response {
            Ok(r) => Ok(r.status().is_success()),
            Err(e) => {
                warn!("OpenAI health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl GenerationService for OpenAIClient {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String> {
        let request = self.build_request(prompt);
        let response = self.chat_completion(&request).await?;

        match response.first_content() {
            Some(content) if !content.trim().is_empty() => {
                debug!("Generated {} chars: {}", content.len(), truncate_string(content, 120));
                Ok(content.to_string())
            }
            _ => Err(EngineError::parsing("Chat completion returned no content")),
        }
    }
}

/// Builder for OpenAI client
#[derive(Debug, Default)]
pub struct OpenAIClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_seconds: Option<u64>,
    temperature: Option<f32>,
}

impl OpenAIClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the timeout in seconds
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build the OpenAI client. Unset values come from the environment, then defaults.
    pub fn build(self) -> Result<OpenAIClient> {
        let mut config = UpstreamConfig::from_provider(&**DEFAULT_PROVIDER).unwrap_or_default();

        if let Some(api_key) = self.api_key {
            config.api_key = api_key;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(timeout) = self.timeout_seconds {
            config.timeout_seconds = timeout;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }

        OpenAIClient::new(config)
    }
}
