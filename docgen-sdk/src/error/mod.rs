//! Error handling for the document engine
//!
//! This module provides the engine's error system that:
//! - Separates transient upstream failures from fatal ones
//! - Carries retry hints for unavailable and rate limited outcomes
//! - Preserves the caller's project when a reconciliation is rejected
//! - Maps every error to the outcome reported back to callers

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::model::Project;

pub mod mapping;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Network or connection errors
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream overloaded or unavailable, or the circuit is open
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        message: String,
        retry_after: Duration,
    },

    /// Upstream rate limit or quota exhausted
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Duration,
    },

    /// Credentials rejected by the upstream
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Request rejected as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream text could not be decoded
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Recovered document has a defect that cannot be repaired
    #[error("Validation error: {0}")]
    Validation(String),

    /// Merged project broke a version invariant; `original` is the untouched input
    #[error("Reconciliation error: {message}")]
    Reconciliation {
        message: String,
        original: Box<Project>,
    },

    /// Deadline elapsed
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<EngineError>,
        context: ErrorContext,
    },
}

/// Outcome reported to the caller for a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOutcome {
    ServiceUnavailable,
    RateLimited,
    AuthConfigError,
    InvalidRequest,
    DecodeFailure,
    ValidationError,
    ReconciliationError,
    TimeoutError,
}

impl ErrorOutcome {
    /// HTTP status a host server should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorOutcome::ServiceUnavailable => 503,
            ErrorOutcome::RateLimited => 429,
            ErrorOutcome::AuthConfigError => 401,
            ErrorOutcome::InvalidRequest => 400,
            ErrorOutcome::DecodeFailure => 502,
            ErrorOutcome::ValidationError => 422,
            ErrorOutcome::ReconciliationError => 409,
            ErrorOutcome::TimeoutError => 504,
        }
    }
}

impl fmt::Display for ErrorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorOutcome::ServiceUnavailable => "ServiceUnavailable",
            ErrorOutcome::RateLimited => "RateLimited",
            ErrorOutcome::AuthConfigError => "AuthConfigError",
            ErrorOutcome::InvalidRequest => "InvalidRequest",
            ErrorOutcome::DecodeFailure => "DecodeFailure",
            ErrorOutcome::ValidationError => "ValidationError",
            ErrorOutcome::ReconciliationError => "ReconciliationError",
            ErrorOutcome::TimeoutError => "TimeoutError",
        };
        f.write_str(name)
    }
}

impl EngineError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        EngineError::Network(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>, retry_after: Duration) -> Self {
        EngineError::ServiceUnavailable {
            message: message.into(),
            retry_after,
        }
    }

    /// Create a rate limit error
    pub fn rate_limited(message: impl Into<String>, retry_after: Duration) -> Self {
        EngineError::RateLimited {
            message: message.into(),
            retry_after,
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        EngineError::Authentication(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        EngineError::Configuration(message.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        EngineError::InvalidRequest(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        EngineError::Parsing(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    /// Create a reconciliation error carrying the caller's original project
    pub fn reconciliation(message: impl Into<String>, original: Project) -> Self {
        EngineError::Reconciliation {
            message: message.into(),
            original: Box::new(original),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        EngineError::Timeout(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal(message.into())
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        EngineError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// Add a single context key/value to an existing error
    pub fn with_context_value(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let mut context = ErrorContext::new();
        context.add(key, value);
        self.with_context(context)
    }

    /// The error without any context wrappers
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Get the HTTP status code recorded by the upstream, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            EngineError::WithContext { context, inner } => {
                context.status_code.or_else(|| inner.status_code())
            }
            _ => None,
        }
    }

    /// Get the service name if available
    pub fn service_name(&self) -> Option<&str> {
        match self {
            EngineError::WithContext { context, .. } => Some(&context.service),
            _ => None,
        }
    }

    /// Transient errors are worth another attempt against the upstream
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Network(_) => true,
            EngineError::ServiceUnavailable { .. } => true,
            EngineError::RateLimited { .. } => true,
            EngineError::WithContext { inner, .. } => inner.is_retryable(),
            _ => false,
        }
    }

    /// Check if this is a permanent error (not retryable)
    pub fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }

    /// Suggested delay before the caller tries again
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            EngineError::ServiceUnavailable { retry_after, .. }
            | EngineError::RateLimited { retry_after, .. } => Some(*retry_after),
            EngineError::WithContext { inner, .. } => inner.retry_after(),
            _ => None,
        }
    }

    /// The caller's project preserved by a rejected reconciliation
    pub fn preserved_project(&self) -> Option<&Project> {
        match self.root() {
            EngineError::Reconciliation { original, .. } => Some(original.as_ref()),
            _ => None,
        }
    }

    /// Outcome reported to the caller
    pub fn outcome(&self) -> ErrorOutcome {
        match self {
            EngineError::Network(_) | EngineError::ServiceUnavailable { .. } => {
                ErrorOutcome::ServiceUnavailable
            }
            EngineError::RateLimited { .. } => ErrorOutcome::RateLimited,
            EngineError::Authentication(_) | EngineError::Configuration(_) => {
                ErrorOutcome::AuthConfigError
            }
            EngineError::InvalidRequest(_) => ErrorOutcome::InvalidRequest,
            EngineError::Parsing(_) => ErrorOutcome::DecodeFailure,
            EngineError::Validation(_) => ErrorOutcome::ValidationError,
            EngineError::Reconciliation { .. } => ErrorOutcome::ReconciliationError,
            EngineError::Timeout(_) => ErrorOutcome::TimeoutError,
            EngineError::Internal(_) => ErrorOutcome::ServiceUnavailable,
            EngineError::WithContext { inner, .. } => inner.outcome(),
        }
    }
}

/// Error context information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Service that generated the error
    pub service: String,

    /// Time the error was recorded
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// HTTP status code if applicable
    pub status_code: Option<u16>,

    /// Service-specific error code
    pub error_code: Option<String>,

    /// Request ID for tracing
    pub request_id: Option<String>,

    /// Endpoint that was called
    pub endpoint: Option<String>,

    /// Additional context data
    pub data: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            timestamp: Some(chrono::Utc::now()),
            status_code: None,
            error_code: None,
            request_id: None,
            endpoint: None,
            data: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error context for a specific service
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Add an HTTP status code
    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Add an error code
    pub fn error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Add a request ID
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Add an endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add a context value
    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.data.insert(key.into(), value.to_string());
    }

    /// Add a context value and return self (builder pattern)
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.add(key, value);
        self
    }
}

/// Convert reqwest errors to EngineError
impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        let context = ErrorContext::for_service("http_client");

        let engine_error = if err.is_timeout() {
            EngineError::service_unavailable(
                format!("Upstream request timed out: {}", err),
                mapping::DEFAULT_UNAVAILABLE_RETRY_AFTER,
            )
        } else if err.is_connect() {
            EngineError::network(format!("Connection error: {}", err))
        } else if err.is_request() {
            EngineError::invalid_request(format!("Invalid request: {}", err))
        } else if err.is_redirect() {
            EngineError::network(format!("Too many redirects: {}", err))
        } else if err.is_decode() {
            EngineError::parsing(format!("Response decode error: {}", err))
        } else {
            EngineError::internal(format!("HTTP client error: {}", err))
        };

        if let Some(status) = err.status() {
            engine_error.with_context(context.status_code(status.as_u16()))
        } else {
            engine_error.with_context(context)
        }
    }
}

/// Convert serde_json errors to EngineError
impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::parsing(format!("JSON error: {}", err))
            .with_context(ErrorContext::for_service("json"))
    }
}
