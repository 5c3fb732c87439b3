//! Document data model
//!
//! A `Project` is an ordered collection of `Document` versions. Version 0 is
//! the canonical original; later entries are edits saved as copies or
//! translations. Every type here serializes with the camelCase wire names
//! the generation service reads and writes.

mod labels;

pub use labels::SequenceScheme;

use serde::{Deserialize, Serialize};

/// Maximum nesting of questions: numbered, lettered, roman.
pub const MAX_QUESTION_DEPTH: usize = 3;

/// Number of header fields every document must carry. `specialNumber` is optional.
pub const REQUIRED_HEADER_COUNT: usize = 8;

/// An ordered, non-empty collection of document versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Document versions in insertion order
    pub content: Vec<Document>,
}

impl Project {
    /// Create a project holding a single version
    pub fn new(document: Document) -> Self {
        Self {
            content: vec![document],
        }
    }

    /// Number of versions
    pub fn version_count(&self) -> usize {
        self.content.len()
    }

    /// Get the version at `index`
    pub fn version(&self, index: usize) -> Option<&Document> {
        self.content.get(index)
    }
}

/// One self-contained headers + questions tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Header fields in display order
    pub headers: Vec<Header>,

    /// Top-level questions
    pub questions: Vec<Question>,
}

impl Document {
    /// Look up a header by field
    pub fn header(&self, field: HeaderField) -> Option<&Header> {
        self.headers.iter().find(|h| h.field == field)
    }

    /// Sum of leaf marks across the question forest
    pub fn question_marks(&self) -> f64 {
        self.questions.iter().map(Question::leaf_marks).sum()
    }

    /// Depth of the deepest question (0 for an empty forest)
    pub fn depth(&self) -> usize {
        self.questions.iter().map(Question::depth).max().unwrap_or(0)
    }

    /// All question nodes in depth-first order
    pub fn walk_questions(&self) -> Vec<&Question> {
        let mut out = Vec::new();
        for question in &self.questions {
            question.collect_into(&mut out);
        }
        out
    }
}

/// The fixed set of header fields on an exam document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderField {
    CourseName,
    ExamType,
    Period,
    SubjectName,
    TotalMarks,
    Duration,
    Notes,
    SubjectCode,
    SpecialNumber,
}

impl HeaderField {
    /// Canonical header order
    pub const ALL: [HeaderField; 9] = [
        HeaderField::CourseName,
        HeaderField::ExamType,
        HeaderField::Period,
        HeaderField::SubjectName,
        HeaderField::TotalMarks,
        HeaderField::Duration,
        HeaderField::Notes,
        HeaderField::SubjectCode,
        HeaderField::SpecialNumber,
    ];

    /// Whether the field holds text that changes under translation.
    /// Durations carry a unit word ("2 hours"); marks and codes never change.
    pub fn is_translatable(&self) -> bool {
        matches!(
            self,
            HeaderField::CourseName
                | HeaderField::ExamType
                | HeaderField::Period
                | HeaderField::SubjectName
                | HeaderField::Duration
                | HeaderField::Notes
        )
    }

    /// Wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderField::CourseName => "courseName",
            HeaderField::ExamType => "examType",
            HeaderField::Period => "period",
            HeaderField::SubjectName => "subjectName",
            HeaderField::TotalMarks => "totalMarks",
            HeaderField::Duration => "duration",
            HeaderField::Notes => "notes",
            HeaderField::SubjectCode => "subjectCode",
            HeaderField::SpecialNumber => "specialNumber",
        }
    }

    /// Parse a wire name, tolerating case and separator differences
    pub fn parse(name: &str) -> Option<Self> {
        let folded: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().to_ascii_lowercase() == folded)
    }
}

impl std::fmt::Display for HeaderField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single header field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub field: HeaderField,
    pub text: String,
    #[serde(default)]
    pub style_tags: Vec<String>,
}

impl Header {
    pub fn new(field: HeaderField, text: impl Into<String>) -> Self {
        Self {
            field,
            text: text.into(),
            style_tags: Vec::new(),
        }
    }
}

/// A node in the question forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// "1", "b", "iii" depending on depth
    pub sequence_label: String,

    /// Opaque style identifiers, never translated or dropped
    pub style_tags: Vec<String>,

    /// Human-readable question text
    pub text: String,

    /// Non-negative weight
    pub marks: f64,

    /// Sub-questions, one level deeper
    pub children: Vec<Question>,
}

impl Question {
    pub fn new(sequence_label: impl Into<String>, text: impl Into<String>, marks: f64) -> Self {
        Self {
            sequence_label: sequence_label.into(),
            style_tags: Vec::new(),
            text: text.into(),
            marks,
            children: Vec::new(),
        }
    }

    /// Attach sub-questions
    pub fn with_children(mut self, children: Vec<Question>) -> Self {
        self.children = children;
        self
    }

    /// Sum of marks over leaves; a leaf contributes its own marks
    pub fn leaf_marks(&self) -> f64 {
        if self.children.is_empty() {
            self.marks
        } else {
            self.children.iter().map(Question::leaf_marks).sum()
        }
    }

    /// Depth of this subtree, counting this node as 1
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Question::depth).max().unwrap_or(0)
    }

    fn collect_into<'a>(&'a self, out: &mut Vec<&'a Question>) {
        out.push(self);
        for child in &self.children {
            child.collect_into(out);
        }
    }
}

/// A file attached to a generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedFile {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl AttachedFile {
    /// Whether the payload can be inlined as text
    pub fn is_text(&self) -> bool {
        let media = self.media_type.to_ascii_lowercase();
        media.starts_with("text/")
            || media == "application/json"
            || media == "application/xml"
            || media.ends_with("+json")
            || media.ends_with("+xml")
    }
}

/// One call into the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub instruction_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,

    #[serde(default)]
    pub active_content_index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_file: Option<AttachedFile>,
}

impl GenerationRequest {
    pub fn new(instruction_text: impl Into<String>) -> Self {
        Self {
            instruction_text: instruction_text.into(),
            project: None,
            active_content_index: 0,
            attached_file: None,
        }
    }

    pub fn with_project(mut self, project: Project, active_content_index: usize) -> Self {
        self.project = Some(project);
        self.active_content_index = active_content_index;
        self
    }

    pub fn with_attachment(mut self, bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        self.attached_file = Some(AttachedFile {
            bytes,
            media_type: media_type.into(),
        });
        self
    }
}

/// Successful engine result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub answer: String,
    pub project: Project,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub used_fallback_template: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_warning: Option<String>,
}
