//! Response normalizer
//!
//! Turns raw upstream text into an `{answer, project}` envelope. The text
//! runs through an ordered chain of repairs, each one keeping the cleanups
//! of the steps before it:
//!
//! 1. parse as-is
//! 2. strip fence lines
//! 3. cut the first balanced object out of surrounding prose
//! 4. drop trailing separators
//! 5. canonical quotes and quoted keys
//! 6. escape control characters
//!
//! A `project` that arrives as a string is decoded with the same chain.
//! When nothing parses, the `content` array is cut out of the raw text and
//! wrapped in a minimal envelope. The last resort is a fixed single-version
//! template, and the result says so.

mod strategies;

use std::fmt;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::error::{EngineError, Result};
use crate::model::{HeaderField, REQUIRED_HEADER_COUNT};
use crate::util::truncate_string;

/// Answer returned alongside the fallback template
pub const FALLBACK_ANSWER: &str =
    "The generated response could not be read. A blank template was returned instead.";

/// Which step of the recovery produced the parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    AsIs,
    StripFences,
    ExtractBalanced,
    RemoveTrailingSeparators,
    NormalizeQuotes,
    EscapeControlChars,
    SectionExtraction,
    FallbackTemplate,
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryStrategy::AsIs => "as_is",
            RecoveryStrategy::StripFences => "strip_fences",
            RecoveryStrategy::ExtractBalanced => "extract_balanced",
            RecoveryStrategy::RemoveTrailingSeparators => "remove_trailing_separators",
            RecoveryStrategy::NormalizeQuotes => "normalize_quotes",
            RecoveryStrategy::EscapeControlChars => "escape_control_chars",
            RecoveryStrategy::SectionExtraction => "section_extraction",
            RecoveryStrategy::FallbackTemplate => "fallback_template",
        };
        f.write_str(name)
    }
}

/// One named repair in the cascade
#[derive(Clone, Copy)]
pub struct RepairStrategy {
    pub kind: RecoveryStrategy,
    repair: fn(&str) -> String,
}

impl RepairStrategy {
    /// Repair `text` and try to parse it. On failure the repaired text is
    /// handed back for the next strategy.
    pub fn attempt(&self, text: &str) -> std::result::Result<Value, String> {
        let repaired = (self.repair)(text);
        match serde_json::from_str::<Value>(&repaired) {
            Ok(value @ Value::Object(_)) => Ok(value),
            _ => Err(repaired),
        }
    }
}

impl fmt::Debug for RepairStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepairStrategy").field("kind", &self.kind).finish()
    }
}

/// The standard cascade, in order
pub const CASCADE: [RepairStrategy; 6] = [
    RepairStrategy {
        kind: RecoveryStrategy::AsIs,
        repair: strategies::as_is,
    },
    RepairStrategy {
        kind: RecoveryStrategy::StripFences,
        repair: strategies::strip_fences,
    },
    RepairStrategy {
        kind: RecoveryStrategy::ExtractBalanced,
        repair: strategies::extract_balanced,
    },
    RepairStrategy {
        kind: RecoveryStrategy::RemoveTrailingSeparators,
        repair: strategies::remove_trailing_separators,
    },
    RepairStrategy {
        kind: RecoveryStrategy::NormalizeQuotes,
        repair: strategies::normalize_quotes,
    },
    RepairStrategy {
        kind: RecoveryStrategy::EscapeControlChars,
        repair: strategies::escape_control_chars,
    },
];

static CONTENT_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["'\u{201C}]?content["'\u{201D}]?\s*:\s*\["#).expect("content key pattern")
});

static ANSWER_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""answer"\s*:\s*("(?:[^"\\]|\\.)*")"#).expect("answer pattern")
});

/// Parsed envelope plus how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    pub answer: String,
    pub project: Value,
    pub strategy: RecoveryStrategy,
    /// Strategy that decoded a string-encoded project, if there was one
    pub payload_strategy: Option<RecoveryStrategy>,
    pub used_fallback: bool,
}

impl NormalizedResponse {
    /// Canonical envelope; normalizing its serialization yields the same parse
    pub fn to_value(&self) -> Value {
        json!({
            "answer": self.answer,
            "project": self.project,
        })
    }
}

/// Drives the repair cascade over upstream text
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    strategies: Vec<RepairStrategy>,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self {
            strategies: CASCADE.to_vec(),
        }
    }
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the repair chain alone and report the first strategy that parsed
    pub fn parse_cascade(&self, text: &str) -> std::result::Result<(Value, RecoveryStrategy), String> {
        let mut current = text.to_string();
        for strategy in &self.strategies {
            match strategy.attempt(&current) {
                Ok(value) => return Ok((value, strategy.kind)),
                Err(next) => current = next,
            }
        }
        Err(current)
    }

    /// Recover an envelope, failing with `Parsing` when every structural strategy fails
    pub fn recover(&self, raw: &str) -> Result<NormalizedResponse> {
        if let Ok((value, strategy)) = self.parse_cascade(raw) {
            match self.into_envelope(value) {
                Some((answer, project, payload_strategy)) => {
                    if strategy != RecoveryStrategy::AsIs {
                        info!("Recovered upstream response via {}", strategy);
                    }
                    return Ok(NormalizedResponse {
                        answer,
                        project,
                        strategy,
                        payload_strategy,
                        used_fallback: false,
                    });
                }
                None => debug!("Parsed response has no usable project payload"),
            }
        }

        if let Some(response) = self.extract_section(raw) {
            info!("Recovered upstream response via {}", RecoveryStrategy::SectionExtraction);
            return Ok(response);
        }

        Err(EngineError::parsing(format!(
            "Upstream response is not a readable document: {}",
            truncate_string(raw, 200)
        )))
    }

    /// Recover an envelope, substituting the fallback template when recovery fails
    pub fn normalize(&self, raw: &str) -> NormalizedResponse {
        match self.recover(raw) {
            Ok(response) => response,
            Err(err) => {
                warn!("{}; using fallback template", err);
                NormalizedResponse {
                    answer: FALLBACK_ANSWER.to_string(),
                    project: fallback_project(),
                    strategy: RecoveryStrategy::FallbackTemplate,
                    payload_strategy: None,
                    used_fallback: true,
                }
            }
        }
    }

    fn into_envelope(&self, value: Value) -> Option<(String, Value, Option<RecoveryStrategy>)> {
        let Value::Object(mut obj) = value else {
            return None;
        };

        let answer = match obj.remove("answer") {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        match obj.remove("project") {
            Some(Value::String(inner)) => {
                let (decoded, strategy) = self.parse_cascade(&inner).ok()?;
                let project = project_payload(decoded)?;
                Some((answer, project, Some(strategy)))
            }
            Some(payload) => Some((answer, project_payload(payload)?, None)),
            None if obj.contains_key("content") => {
                Some((answer, Value::Object(obj), None))
            }
            None => None,
        }
    }

    fn extract_section(&self, raw: &str) -> Option<NormalizedResponse> {
        let unescaped = raw.replace("\\\"", "\"");
        for candidate in [raw, unescaped.as_str()] {
            for found in CONTENT_KEY.find_iter(candidate) {
                let open_at = found.end() - 1;
                let Some(section) = strategies::balanced_section(candidate, open_at) else {
                    continue;
                };

                let cleaned = strategies::escape_control_chars(&strategies::normalize_quotes(
                    &strategies::remove_trailing_separators(section),
                ));

                if let Ok(Value::Array(content)) = serde_json::from_str::<Value>(&cleaned) {
                    return Some(NormalizedResponse {
                        answer: salvage_answer(candidate),
                        project: json!({ "content": content }),
                        strategy: RecoveryStrategy::SectionExtraction,
                        payload_strategy: None,
                        used_fallback: false,
                    });
                }
            }
        }
        None
    }
}

fn project_payload(payload: Value) -> Option<Value> {
    match payload {
        Value::Object(_) => Some(payload),
        Value::Array(content) => {
            let mut obj = Map::new();
            obj.insert("content".to_string(), Value::Array(content));
            Some(Value::Object(obj))
        }
        _ => None,
    }
}

fn salvage_answer(text: &str) -> String {
    ANSWER_VALUE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| serde_json::from_str::<String>(m.as_str()).ok())
        .unwrap_or_default()
}

/// The deterministic single-version template used when recovery fails
pub fn fallback_project() -> Value {
    let headers: Vec<Value> = HeaderField::ALL[..REQUIRED_HEADER_COUNT]
        .iter()
        .map(|field| {
            json!({
                "field": field.as_str(),
                "text": "",
                "styleTags": [],
            })
        })
        .collect();

    json!({
        "content": [
            {
                "headers": headers,
                "questions": [],
            }
        ]
    })
}
