//! Tests for environment-driven configuration
//!
//! Each test uses its own namespace so the process-wide environment is
//! never shared between tests running in parallel.

#[cfg(test)]
mod tests {
    use std::env;
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use crate::config::{
        ConfigProviderExt, EngineConfig, EnvConfigProvider, ServiceConfig, UpstreamConfig,
    };
    use crate::error::{EngineError, ErrorOutcome};
    use crate::resilience::Resilience;

    fn provider(namespace: &str) -> EnvConfigProvider {
        EnvConfigProvider::new()
            .with_prefix("DOCGEN")
            .with_namespace(namespace)
    }

    #[test]
    fn test_engine_config_from_env() {
        env::set_var("DOCGEN_CFGA_ENGINE_FAILURE_THRESHOLD", "4");
        env::set_var("DOCGEN_CFGA_ENGINE_COOLDOWN", "45s");
        env::set_var("DOCGEN_CFGA_ENGINE_MAX_ATTEMPTS", "2");
        env::set_var("DOCGEN_CFGA_ENGINE_DEADLINE", "90");

        let config = assert_ok!(EngineConfig::from_provider(&provider("CFGA")));
        assert_eq!(config.failure_threshold, 4);
        assert_eq!(config.cooldown, Duration::from_secs(45));
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.deadline, Duration::from_secs(90));
        assert_eq!(config.backoff_unit, Duration::from_secs(1));
        assert_eq!(config.service_name(), "engine");

        let resilience = Resilience::from_engine_config(&config);
        assert_eq!(resilience.deadline(), Duration::from_secs(90));
        assert_eq!(resilience.circuit_breaker().config().failure_threshold, 4);
    }

    #[test]
    fn test_unparseable_values_fall_back_to_defaults() {
        env::set_var("DOCGEN_CFGB_ENGINE_COOLDOWN", "soon");
        env::set_var("DOCGEN_CFGB_ENGINE_MAX_ATTEMPTS", "three");

        let provider = provider("CFGB");
        assert!(provider.get_duration("engine_cooldown").is_err());

        let config = assert_ok!(EngineConfig::from_provider(&provider));
        assert_eq!(config.cooldown, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_zero_deadline_is_rejected() {
        env::set_var("DOCGEN_CFGC_ENGINE_DEADLINE", "0s");

        let err = assert_err!(EngineConfig::from_provider(&provider("CFGC")));
        assert_eq!(err.outcome(), ErrorOutcome::AuthConfigError);
    }

    #[test]
    fn test_upstream_config_from_env() {
        env::set_var("DOCGEN_CFGD_OPENAI_API_KEY", "sk-test");
        env::set_var("DOCGEN_CFGD_OPENAI_MODEL", "gpt-4o");
        env::set_var("DOCGEN_CFGD_OPENAI_TEMPERATURE", "0.5");

        let config = assert_ok!(UpstreamConfig::from_provider(&provider("CFGD")));
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert!((config.temperature - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let err = assert_err!(UpstreamConfig::from_provider(&provider("CFGE")));

        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(err.to_string().contains("DOCGEN_CFGE_OPENAI_API_KEY"));
        assert!(!err.is_retryable());
    }
}
