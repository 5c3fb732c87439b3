//! Configuration management for the engine and its upstream client
//!
//! This module provides utilities for loading and validating configuration
//! from environment variables or in-memory maps.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::util::parse_duration;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value.trim().parse::<i64>().map_err(|e| {
            EngineError::configuration(format!("Invalid integer for key {}: {}", key, e))
        })
    }

    /// Get a float configuration value
    fn get_float(&self, key: &str) -> Result<f64> {
        let value = self.get_string(key)?;
        value.trim().parse::<f64>().map_err(|e| {
            EngineError::configuration(format!("Invalid float for key {}: {}", key, e))
        })
    }

    /// Get a duration value such as `30s`, `500ms` or a bare number of seconds
    fn get_duration(&self, key: &str) -> Result<Duration> {
        let value = self.get_string(key)?;
        parse_duration(&value).ok_or_else(|| {
            EngineError::configuration(format!("Invalid duration for key {}: {}", key, value))
        })
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get an integer configuration value with a default
    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    /// Get a float configuration value with a default
    fn get_float_or(&self, key: &str, default: f64) -> f64 {
        self.get_float(key).unwrap_or(default)
    }

    /// Get a duration value with a default
    fn get_duration_or(&self, key: &str, default: Duration) -> Duration {
        self.get_duration(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "ENGINE", "OPENAI")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        env_key.push_str(
            &key.to_uppercase()
                .replace(|c: char| !c.is_ascii_alphanumeric(), "_"),
        );

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                EngineError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => EngineError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values.get(key).cloned().ok_or_else(|| {
            EngineError::configuration(format!("Configuration key not found: {}", key))
        })
    }
}

/// Global default configuration provider
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix("DOCGEN")));

/// Trait for validated configuration sections
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Section name
    fn service_name(&self) -> &str;
}

const DEFAULT_SYSTEM_CONTEXT: &str = "You edit exam papers. Reply with a JSON object \
{\"answer\": string, \"project\": {\"content\": [document, ...]}} where every document has \
\"headers\" and \"questions\". Keep every existing version. Never change marks, sequence \
labels or style tags unless asked.";

/// Resilience and pipeline settings for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: usize,

    /// Time the circuit stays open after the last failure
    pub cooldown: Duration,

    /// Upstream attempts per request, including the first
    pub max_attempts: u32,

    /// Base unit for the `2^n` backoff between attempts
    pub backoff_unit: Duration,

    /// Wall-clock budget for the whole attempt sequence
    pub deadline: Duration,

    /// System context sent with every upstream call
    pub system_context: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            deadline: Duration::from_secs(60),
            system_context: DEFAULT_SYSTEM_CONTEXT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a config provider, falling back to defaults per key
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            failure_threshold: provider
                .get_int_or("engine_failure_threshold", defaults.failure_threshold as i64)
                .max(0) as usize,
            cooldown: provider.get_duration_or("engine_cooldown", defaults.cooldown),
            max_attempts: provider
                .get_int_or("engine_max_attempts", defaults.max_attempts as i64)
                .max(0) as u32,
            backoff_unit: provider.get_duration_or("engine_backoff_unit", defaults.backoff_unit),
            deadline: provider.get_duration_or("engine_deadline", defaults.deadline),
            system_context: provider
                .get_string_or("engine_system_context", &defaults.system_context),
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(EngineError::configuration(
                "Failure threshold must be at least 1",
            ));
        }

        if self.max_attempts == 0 {
            return Err(EngineError::configuration("At least one attempt is required"));
        }

        if self.deadline.is_zero() {
            return Err(EngineError::configuration("Deadline must be positive"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "engine"
    }
}

/// Connection settings for the OpenAI-compatible generation upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API key
    pub api_key: String,

    /// Base URL (can be changed for proxies)
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 60,
            temperature: 0.2,
        }
    }
}

impl UpstreamConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            api_key: provider.get_string("openai_api_key")?,
            base_url: provider.get_string_or("openai_base_url", &defaults.base_url),
            model: provider.get_string_or("openai_model", &defaults.model),
            timeout_seconds: provider
                .get_int_or("openai_timeout_seconds", defaults.timeout_seconds as i64)
                .max(1) as u64,
            temperature: provider
                .get_float_or("openai_temperature", defaults.temperature as f64)
                as f32,
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for UpstreamConfig {
    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(EngineError::configuration("OpenAI API key is required"));
        }

        url::Url::parse(&self.base_url).map_err(|e| {
            EngineError::configuration(format!("Invalid OpenAI base URL {}: {}", self.base_url, e))
        })?;

        if self.model.is_empty() {
            return Err(EngineError::configuration("OpenAI model is required"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "openai"
    }
}
