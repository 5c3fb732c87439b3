//! Document Engine Demo
//!
//! Runs the engine offline against a scripted upstream that is overloaded
//! once, then answers with malformed JSON, to show retry, recovery and
//! reconciliation working together.
//!
//! Run with `RUST_LOG=debug cargo run --example engine_demo` for the full trace.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use docgen_sdk::{
    DocumentEngine, EngineConfig, EngineError, GenerationPrompt, GenerationRequest,
    GenerationService, Header, HeaderField, Project, Question,
};

/// Upstream that fails on the first call and returns sloppy JSON afterwards
struct ScriptedUpstream {
    calls: AtomicUsize,
}

#[async_trait]
impl GenerationService for ScriptedUpstream {
    async fn generate(&self, prompt: &GenerationPrompt) -> docgen_sdk::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        println!("Upstream call {}: {}", call, prompt.instruction);

        if call == 1 {
            return Err(EngineError::service_unavailable(
                "The model is overloaded",
                Duration::from_secs(1),
            ));
        }

        let project = json!({ "content": [sample_document()] });
        // Unquoted key and a trailing comma, as models often produce
        Ok(format!(
            "```json\n{{\"answer\": \"Here is your copy\", project: {},}}\n```",
            project
        ))
    }
}

fn sample_document() -> docgen_sdk::Document {
    let headers = HeaderField::ALL
        .iter()
        .take(8)
        .map(|field| Header::new(*field, format!("{} text", field.as_str())))
        .collect();

    docgen_sdk::Document {
        headers,
        questions: vec![
            Question::new("1", "State Newton's first law", 4.0),
            Question::new("2", "Explain momentum", 0.0).with_children(vec![
                Question::new("a", "Define momentum", 2.0),
                Question::new("b", "Give an example", 2.0),
            ]),
        ],
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    println!("Document Engine Demo");
    println!("====================\n");

    let config = EngineConfig {
        backoff_unit: Duration::from_millis(100),
        ..EngineConfig::default()
    };
    let engine = DocumentEngine::new(
        ScriptedUpstream {
            calls: AtomicUsize::new(0),
        },
        config,
    );

    let original = Project::new(sample_document());
    let response = engine
        .generate(GenerationRequest::new("make a copy of this paper").with_project(original, 0))
        .await?;

    println!("\nAnswer: {}", response.answer);
    println!("Versions: {}", response.project.content.len());
    println!("Fallback used: {}", response.used_fallback_template);
    println!("Circuit breaker: {}", engine.circuit_breaker_status());
    println!("\n{}", serde_json::to_string_pretty(&response.project)?);

    Ok(())
}
