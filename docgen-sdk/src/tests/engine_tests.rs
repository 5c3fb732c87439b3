//! End-to-end tests for the document engine
//!
//! The upstream is replaced by a mockall mock so each test controls the
//! exact raw text the engine has to work with.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use serde_json::json;

    use crate::core::MockGenerationService;
    use crate::engine::DocumentEngine;
    use crate::error::{EngineError, ErrorOutcome};
    use crate::model::{GenerationRequest, HeaderField, Project};
    use crate::normalizer::FALLBACK_ANSWER;
    use crate::resilience::CircuitBreakerStatus;
    use crate::tests::fixtures::{
        english_document, english_project, envelope, fast_config, french_document,
    };

    fn engine_returning(raw: String) -> DocumentEngine<MockGenerationService> {
        let mut service = MockGenerationService::new();
        service
            .expect_generate()
            .returning(move |_| Ok(raw.clone()));
        DocumentEngine::new(service, fast_config())
    }

    #[tokio::test]
    async fn test_scenario_a_direct_edit() {
        let mut edited = english_document();
        edited.questions[0].text = "Explain the law of inertia".to_string();
        let engine = engine_returning(envelope("Reworded question 1", &Project::new(edited.clone())));

        let original = english_project();
        let response = engine
            .generate(
                GenerationRequest::new("fix the wording of question 1")
                    .with_project(original.clone(), 0),
            )
            .await
            .unwrap();

        assert_eq!(response.project.content.len(), 1);
        assert_eq!(response.project.content[0], edited);
        assert_ne!(response.project.content[0], original.content[0]);
        assert_eq!(response.answer, "Reworded question 1");
        assert!(!response.used_fallback_template);
    }

    #[tokio::test]
    async fn test_scenario_b_copy() {
        let original = english_project();
        assert_eq!(original.content[0].questions.len(), 2);
        let engine = engine_returning(envelope("Copied", &original));

        let response = engine
            .generate(GenerationRequest::new("make a copy").with_project(original.clone(), 0))
            .await
            .unwrap();

        assert_eq!(response.project.content.len(), 2);
        assert_eq!(response.project.content[0], original.content[0]);
        assert_eq!(response.project.content[1], original.content[0]);
    }

    #[tokio::test]
    async fn test_copy_ignores_model_rewrite() {
        let mut rewritten = english_document();
        rewritten.questions[0].text = "Rewritten by model".to_string();
        rewritten.questions[0].marks = 3.0;
        let engine = engine_returning(envelope("Copied", &Project::new(rewritten)));

        let original = english_project();
        let response = engine
            .generate(GenerationRequest::new("make a copy").with_project(original.clone(), 0))
            .await
            .unwrap();

        assert_eq!(response.project.content.len(), 2);
        assert_eq!(response.project.content[1], original.content[0]);
    }

    #[tokio::test]
    async fn test_copy_with_language_word_is_not_translated() {
        let engine = engine_returning(envelope("Copied", &english_project()));

        let original = english_project();
        let response = engine
            .generate(
                GenerationRequest::new("make a copy and fix the English grammar")
                    .with_project(original.clone(), 0),
            )
            .await
            .unwrap();

        assert_eq!(response.project.content.len(), 2);
        assert_eq!(response.project.content[1], original.content[0]);
        assert!(response.translation_warning.is_none());
    }

    #[tokio::test]
    async fn test_scenario_c_translation() {
        let candidate = Project {
            content: vec![english_document(), french_document()],
        };
        let engine = engine_returning(envelope("Traduit", &candidate));

        let original = english_project();
        let response = engine
            .generate(
                GenerationRequest::new("create a French version").with_project(original.clone(), 0),
            )
            .await
            .unwrap();

        let content = &response.project.content;
        assert_eq!(content.len(), 2);
        assert_eq!(content[0], original.content[0]);

        let (source, translated) = (&content[0], &content[1]);
        for field in [HeaderField::CourseName, HeaderField::Duration, HeaderField::Notes] {
            assert_ne!(
                source.header(field).unwrap().text,
                translated.header(field).unwrap().text
            );
        }
        assert_eq!(
            source.header(HeaderField::TotalMarks).unwrap().text,
            translated.header(HeaderField::TotalMarks).unwrap().text
        );

        let marks = |d: &crate::model::Document| {
            d.walk_questions()
                .iter()
                .map(|q| (q.sequence_label.clone(), q.marks))
                .collect::<Vec<_>>()
        };
        assert_eq!(marks(source), marks(translated));
        assert!(response.translation_warning.is_none());
    }

    #[tokio::test]
    async fn test_translation_from_string_encoded_project() {
        let inner = serde_json::to_string(&Project::new(french_document())).unwrap();
        let raw = json!({"answer": "ok", "project": inner}).to_string();
        let engine = engine_returning(raw);

        let response = engine
            .generate(GenerationRequest::new("translate to french").with_project(english_project(), 0))
            .await
            .unwrap();
        assert_eq!(response.project.content.len(), 2);
        assert_eq!(response.project.content[1].questions[0].text, "Expliquez l'inertie");
    }

    #[tokio::test]
    async fn test_scenario_d_breaker_opens_and_rejects_without_upstream_call() {
        let mut service = MockGenerationService::new();
        service.expect_generate().times(3).returning(|_| {
            Err(EngineError::service_unavailable(
                "The model is overloaded",
                Duration::from_secs(1),
            ))
        });
        let engine = DocumentEngine::new(service, fast_config());

        let err = engine
            .generate(GenerationRequest::new("fix question 1").with_project(english_project(), 0))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(engine.circuit_breaker_status(), CircuitBreakerStatus::Open);

        let rejected = engine
            .generate(GenerationRequest::new("fix question 1").with_project(english_project(), 0))
            .await
            .unwrap_err();
        assert_eq!(rejected.outcome(), ErrorOutcome::ServiceUnavailable);
        let retry_after = rejected.retry_after().unwrap();
        assert!(retry_after > Duration::ZERO && retry_after <= Duration::from_secs(30));

        engine.reset_circuit_breaker();
        assert_eq!(engine.circuit_breaker_status(), CircuitBreakerStatus::Closed);
    }

    #[tokio::test]
    async fn test_fatal_upstream_error_is_not_retried() {
        let mut service = MockGenerationService::new();
        service
            .expect_generate()
            .times(1)
            .returning(|_| Err(EngineError::authentication("Incorrect API key provided")));
        let engine = DocumentEngine::new(service, fast_config());

        let err = engine
            .generate(GenerationRequest::new("make a copy"))
            .await
            .unwrap_err();
        assert_eq!(err.outcome(), ErrorOutcome::AuthConfigError);
        assert_eq!(err.outcome().status_code(), 401);
    }

    #[tokio::test]
    async fn test_scenario_e_malformed_output_is_recovered() {
        let body = serde_json::to_string(&english_project()).unwrap();
        let raw = format!("{{\"answer\": \"Done\", project: {},}}", body);
        let engine = engine_returning(raw);

        let response = engine
            .generate(GenerationRequest::new("make a copy").with_project(english_project(), 0))
            .await
            .unwrap();
        assert_eq!(response.answer, "Done");
        assert_eq!(response.project.content.len(), 2);
        assert!(!response.used_fallback_template);
    }

    #[tokio::test]
    async fn test_fallback_keeps_caller_project() {
        let engine = engine_returning("Sorry, I cannot do that right now.".to_string());
        let original = english_project();

        let response = engine
            .generate(GenerationRequest::new("make a copy").with_project(original.clone(), 0))
            .await
            .unwrap();

        assert!(response.used_fallback_template);
        assert_eq!(response.answer, FALLBACK_ANSWER);
        assert_eq!(response.project, original);
    }

    #[tokio::test]
    async fn test_fallback_without_project_returns_template() {
        let engine = engine_returning("<html>502 Bad Gateway</html>".to_string());

        let response = engine
            .generate(GenerationRequest::new("write a physics paper"))
            .await
            .unwrap();

        assert!(response.used_fallback_template);
        assert_eq!(response.project.content.len(), 1);
        assert!(response.project.content[0].questions.is_empty());
        assert_eq!(response.project.content[0].headers.len(), 8);

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["usedFallbackTemplate"], true);
    }

    #[tokio::test]
    async fn test_validation_failure_applies_nothing() {
        let raw = json!({
            "answer": "ok",
            "project": {"content": [{"headers": [], "questions": []}]}
        })
        .to_string();
        let engine = engine_returning(raw);

        let err = engine
            .generate(GenerationRequest::new("fix question 1").with_project(english_project(), 0))
            .await
            .unwrap_err();
        assert_eq!(err.outcome(), ErrorOutcome::ValidationError);
    }

    #[tokio::test]
    async fn test_reconciliation_failure_returns_original() {
        let mut broken = french_document();
        broken.questions[1].children.pop();
        let engine = engine_returning(envelope("ok", &Project::new(broken)));
        let original = english_project();

        let err = engine
            .generate(GenerationRequest::new("translate into French").with_project(original.clone(), 0))
            .await
            .unwrap_err();

        assert_eq!(err.outcome(), ErrorOutcome::ReconciliationError);
        assert_eq!(err.preserved_project(), Some(&original));
    }

    #[tokio::test]
    async fn test_invalid_requests_never_reach_upstream() {
        let mut service = MockGenerationService::new();
        service.expect_generate().never();
        let engine = DocumentEngine::new(service, fast_config());

        let err = engine.generate(GenerationRequest::new("   ")).await.unwrap_err();
        assert_eq!(err.outcome(), ErrorOutcome::InvalidRequest);

        let err = engine
            .generate(GenerationRequest::new("make a copy").with_project(english_project(), 3))
            .await
            .unwrap_err();
        assert_eq!(err.outcome(), ErrorOutcome::InvalidRequest);
    }

    #[tokio::test]
    async fn test_prompt_carries_project_and_attachment() {
        let mut service = MockGenerationService::new();
        let reply = envelope("ok", &english_project());
        service
            .expect_generate()
            .withf(|prompt| {
                prompt.instruction == "use the attached syllabus"
                    && prompt
                        .project_text
                        .as_deref()
                        .map_or(false, |text| text.contains("PHY101"))
                    && prompt
                        .attached_file
                        .as_ref()
                        .map_or(false, |f| f.media_type == "text/plain")
            })
            .times(1)
            .returning(move |_| Ok(reply.clone()));
        let engine = DocumentEngine::new(service, fast_config());

        let request = GenerationRequest::new("use the attached syllabus")
            .with_project(english_project(), 0)
            .with_attachment(b"Unit 1: Newton's laws".to_vec(), "text/plain");
        assert!(engine.generate(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_breaker() {
        let engine = Arc::new(engine_returning(envelope("Copied", &english_project())));

        let requests = (0..8).map(|_| {
            let engine = Arc::clone(&engine);
            async move {
                engine
                    .generate(GenerationRequest::new("make a copy").with_project(english_project(), 0))
                    .await
            }
        });

        for result in join_all(requests).await {
            assert_eq!(result.unwrap().project.content.len(), 2);
        }
        assert_eq!(engine.circuit_breaker_status(), CircuitBreakerStatus::Closed);
    }
}
