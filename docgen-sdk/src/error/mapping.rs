//! Error mapping for the generation upstream
//!
//! This module converts upstream HTTP statuses and free-text error
//! messages into the engine's transient/fatal taxonomy.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use super::{EngineError, ErrorContext};

/// Retry hint for an overloaded upstream that sent no `Retry-After`
pub const DEFAULT_UNAVAILABLE_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Retry hint for a rate limited upstream that sent no `Retry-After`
pub const DEFAULT_RATE_LIMIT_RETRY_AFTER: Duration = Duration::from_secs(60);

const OVERLOAD_MARKERS: [&str; 5] = [
    "overloaded",
    "unavailable",
    "try again later",
    "server is busy",
    "capacity",
];

const RATE_LIMIT_MARKERS: [&str; 5] = [
    "rate limit",
    "rate_limit",
    "ratelimit",
    "quota",
    "too many requests",
];

const AUTH_MARKERS: [&str; 5] = [
    "api key",
    "api_key",
    "unauthorized",
    "permission denied",
    "invalid authentication",
];

/// Classify a free-text upstream error message
pub fn classify_upstream_message(message: &str, retry_after: Option<Duration>) -> EngineError {
    let lowered = message.to_lowercase();

    if RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m)) || lowered.contains("429") {
        EngineError::rate_limited(
            message,
            retry_after.unwrap_or(DEFAULT_RATE_LIMIT_RETRY_AFTER),
        )
    } else if OVERLOAD_MARKERS.iter().any(|m| lowered.contains(m))
        || lowered.contains("503")
        || lowered.contains("529")
    {
        EngineError::service_unavailable(
            message,
            retry_after.unwrap_or(DEFAULT_UNAVAILABLE_RETRY_AFTER),
        )
    } else if AUTH_MARKERS.iter().any(|m| lowered.contains(m)) {
        EngineError::authentication(message)
    } else {
        EngineError::invalid_request(message)
    }
}

/// Map an upstream HTTP error to an EngineError
pub fn map_http_error(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
    context: &mut ErrorContext,
) -> EngineError {
    let message = extract_message(body).unwrap_or_else(|| {
        if body.is_empty() {
            status.to_string()
        } else if body.len() > 100 {
            format!("{}: {}", status, crate::util::truncate_string(body, 100))
        } else {
            format!("{}: {}", status, body)
        }
    });

    if let Some(code) = extract_code(body) {
        context.error_code = Some(code);
    }
    context.add("category", classify_http_error(status));

    match status.as_u16() {
        401 | 403 => EngineError::authentication(message),
        429 => EngineError::rate_limited(
            message,
            retry_after.unwrap_or(DEFAULT_RATE_LIMIT_RETRY_AFTER),
        ),
        408 | 500 | 502 | 503 | 504 | 529 => EngineError::service_unavailable(
            message,
            retry_after.unwrap_or(DEFAULT_UNAVAILABLE_RETRY_AFTER),
        ),
        400 | 404 | 413 | 415 | 422 => {
            // Some providers report quota exhaustion with a 400
            match classify_upstream_message(&message, retry_after) {
                err @ EngineError::RateLimited { .. } => err,
                _ => EngineError::invalid_request(message),
            }
        }
        _ => classify_upstream_message(&message, retry_after),
    }
}

/// Helper function to classify HTTP errors by category
pub fn classify_http_error(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 | 404 | 413 | 415 | 422 => "invalid_request",
        401 | 403 => "auth_config",
        408 => "timeout",
        429 => "rate_limit",
        500..=599 => "unavailable",
        _ => "unknown",
    }
}

/// Parse a `Retry-After` header value given in whole seconds
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn extract_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    let error = json.get("error").unwrap_or(&json);
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

fn extract_code(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    let error = json.get("error")?;
    error
        .get("code")
        .or_else(|| error.get("type"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
