//! Document validation and repair
//!
//! Converts a recovered JSON project into the typed model. Structural
//! metadata that is missing or mistyped is repaired in place; defects that
//! cannot be repaired without inventing content are reported as
//! `EngineError::Validation` naming the first offending path.

use log::debug;
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};
use crate::model::{
    Document, Header, HeaderField, Project, Question, SequenceScheme, MAX_QUESTION_DEPTH,
    REQUIRED_HEADER_COUNT,
};

/// Tally of repairs applied while validating one project
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    pub labels_synthesized: usize,
    pub style_tags_defaulted: usize,
    pub text_coerced: usize,
    pub marks_coerced: usize,
    pub children_defaulted: usize,
    pub headers_dropped: usize,
}

impl RepairReport {
    /// Total number of repairs
    pub fn total(&self) -> usize {
        self.labels_synthesized
            + self.style_tags_defaulted
            + self.text_coerced
            + self.marks_coerced
            + self.children_defaulted
            + self.headers_dropped
    }
}

/// Validates and repairs candidate projects
#[derive(Debug, Clone)]
pub struct DocumentValidator {
    required_headers: usize,
    max_depth: usize,
}

impl Default for DocumentValidator {
    fn default() -> Self {
        Self {
            required_headers: REQUIRED_HEADER_COUNT,
            max_depth: MAX_QUESTION_DEPTH,
        }
    }
}

impl DocumentValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a project value, returning the repaired typed project
    pub fn validate(&self, value: &Value) -> Result<Project> {
        self.validate_with_report(value).map(|(project, _)| project)
    }

    /// Validate a project value and report what had to be repaired
    pub fn validate_with_report(&self, value: &Value) -> Result<(Project, RepairReport)> {
        let mut report = RepairReport::default();

        let content = match value.get("content") {
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(Value::Array(_)) => {
                return Err(EngineError::validation("content holds no document versions"))
            }
            Some(_) => return Err(EngineError::validation("content is not a list of documents")),
            None => return Err(EngineError::validation("project is missing its content list")),
        };

        let mut documents = Vec::with_capacity(content.len());
        for (index, item) in content.iter().enumerate() {
            let path = format!("content[{}]", index);
            documents.push(self.validate_document(item, &path, &mut report)?);
        }

        if report.total() > 0 {
            debug!("Repaired candidate project: {:?}", report);
        }

        Ok((Project { content: documents }, report))
    }

    fn validate_document(
        &self,
        value: &Value,
        path: &str,
        report: &mut RepairReport,
    ) -> Result<Document> {
        let Value::Object(obj) = value else {
            return Err(EngineError::validation(format!("{} is not a document", path)));
        };

        let headers = self.validate_headers(obj.get("headers"), path, report)?;

        let questions = match obj.get("questions") {
            Some(Value::Array(items)) => {
                self.validate_questions(items, 0, &format!("{}.questions", path), report)?
            }
            Some(_) => {
                return Err(EngineError::validation(format!(
                    "{}.questions is not a list",
                    path
                )))
            }
            None => {
                return Err(EngineError::validation(format!(
                    "{} is missing its questions list",
                    path
                )))
            }
        };

        Ok(Document { headers, questions })
    }

    fn validate_headers(
        &self,
        value: Option<&Value>,
        path: &str,
        report: &mut RepairReport,
    ) -> Result<Vec<Header>> {
        let mut headers = Vec::new();

        match value {
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    let header_path = format!("{}.headers[{}]", path, index);
                    let Value::Object(entry) = item else {
                        return Err(EngineError::validation(format!(
                            "{} is not a header",
                            header_path
                        )));
                    };

                    let Some(field) = entry
                        .get("field")
                        .and_then(Value::as_str)
                        .and_then(HeaderField::parse)
                    else {
                        debug!("Dropping unrecognised header at {}", header_path);
                        report.headers_dropped += 1;
                        continue;
                    };

                    let text = match entry.get("text") {
                        Some(v) => header_text(v, &header_path)?,
                        None => {
                            return Err(EngineError::validation(format!(
                                "{} ({}) has no text",
                                header_path, field
                            )))
                        }
                    };

                    headers.push(Header {
                        field,
                        text,
                        style_tags: style_tags(entry, report),
                    });
                }
            }
            // Keyed form: {"courseName": "...", ...}
            Some(Value::Object(map)) => {
                for field in HeaderField::ALL {
                    let entry = map
                        .iter()
                        .find(|(key, _)| HeaderField::parse(key) == Some(field))
                        .map(|(_, v)| v);
                    if let Some(v) = entry {
                        let header_path = format!("{}.headers.{}", path, field);
                        headers.push(Header::new(field, header_text(v, &header_path)?));
                    }
                }
            }
            Some(_) => {
                return Err(EngineError::validation(format!(
                    "{}.headers is not a list",
                    path
                )))
            }
            None => {
                return Err(EngineError::validation(format!(
                    "{} is missing its headers",
                    path
                )))
            }
        }

        if headers.len() < self.required_headers {
            return Err(EngineError::validation(format!(
                "{} has {} headers, at least {} are required",
                path,
                headers.len(),
                self.required_headers
            )));
        }

        Ok(headers)
    }

    fn validate_questions(
        &self,
        items: &[Value],
        depth: usize,
        path: &str,
        report: &mut RepairReport,
    ) -> Result<Vec<Question>> {
        if depth >= self.max_depth && !items.is_empty() {
            return Err(EngineError::validation(format!(
                "{} nests questions deeper than {} levels",
                path, self.max_depth
            )));
        }

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.validate_question(item, depth, index, &format!("{}[{}]", path, index), report)
            })
            .collect()
    }

    fn validate_question(
        &self,
        value: &Value,
        depth: usize,
        index: usize,
        path: &str,
        report: &mut RepairReport,
    ) -> Result<Question> {
        let Value::Object(obj) = value else {
            return Err(EngineError::validation(format!("{} is not a question", path)));
        };

        let sequence_label = match obj.get("sequenceLabel") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                report.labels_synthesized += 1;
                SequenceScheme::label_for(depth, index)
            }
        };

        let text = match obj.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => {
                report.text_coerced += 1;
                n.to_string()
            }
            Some(Value::Bool(b)) => {
                report.text_coerced += 1;
                b.to_string()
            }
            _ => {
                report.text_coerced += 1;
                String::new()
            }
        };

        let marks = match obj.get("marks") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            other => {
                report.marks_coerced += 1;
                other
                    .and_then(Value::as_str)
                    .and_then(parse_marks)
                    .unwrap_or(0.0)
            }
        };

        let children = match obj.get("children") {
            Some(Value::Array(items)) => {
                self.validate_questions(items, depth + 1, &format!("{}.children", path), report)?
            }
            _ => {
                report.children_defaulted += 1;
                Vec::new()
            }
        };

        Ok(Question {
            sequence_label,
            style_tags: style_tags(obj, report),
            text,
            marks: marks.max(0.0),
            children,
        })
    }
}

/// Validate with the default limits
pub fn validate_project(value: &Value) -> Result<Project> {
    DocumentValidator::default().validate(value)
}

fn header_text(value: &Value, path: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(EngineError::validation(format!(
            "{} text is not a scalar value",
            path
        ))),
    }
}

fn style_tags(obj: &Map<String, Value>, report: &mut RepairReport) -> Vec<String> {
    match obj.get("styleTags") {
        Some(Value::Array(tags)) => tags
            .iter()
            .map(|tag| match tag {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => {
            report.style_tags_defaulted += 1;
            Vec::new()
        }
    }
}

// Accepts "5", " 2.5 ", "5 marks"
fn parse_marks(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        return n.is_finite().then_some(n);
    }
    let numeric: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse::<f64>().ok()
}
