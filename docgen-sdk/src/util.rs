//! Small helpers shared by the upstream client and the engine

use std::future::Future;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;

// Upstream keys and tokens that can show up in error bodies or prompts
static SECRET_SCRUBBERS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)bearer\s+[A-Za-z0-9\-_\.]+", "Bearer [REDACTED]"),
        (r"sk-[A-Za-z0-9\-_]{8,}", "sk-[REDACTED]"),
        (r#"(?i)(api[_-]?key|token)["']?\s*[=:]\s*["']?[A-Za-z0-9\-_\.]+"#, "$1=[REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Run `op` and report how long it took
pub async fn measure_time_async<F, Fut, T>(op: F) -> (T, Duration)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let started = Instant::now();
    let value = op().await;
    (value, started.elapsed())
}

/// Shorten `text` to `max_chars` characters, marking the cut with `...`
pub fn truncate_string(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    match max_chars.checked_sub(3) {
        Some(keep) if keep > 0 => format!("{}...", text.chars().take(keep).collect::<String>()),
        _ => text.chars().take(max_chars).collect(),
    }
}

/// Replace API keys and bearer tokens before text reaches a log line
pub fn sanitize_for_logging(text: &str) -> String {
    SECRET_SCRUBBERS
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// Correlation id for one engine request
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parse `250ms`, `30s`, `2m`, `1h` or a bare number of seconds
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim().to_lowercase();

    let (number, unit_ms) = if let Some(n) = text.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = text.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = text.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = text.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (text.as_str(), 1_000)
    };

    let value = number.trim().parse::<u64>().ok()?;
    value.checked_mul(unit_ms).map(Duration::from_millis)
}
