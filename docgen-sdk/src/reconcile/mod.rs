//! Version reconciliation
//!
//! Merges a validated candidate into the caller's project. Edits replace the
//! active version only; copies and translations append exactly one version
//! and leave every existing one untouched. The merged project is checked
//! against those rules before it is returned, and any violation rejects the
//! whole change with the caller's original project attached to the error.

pub mod intent;

pub use intent::{classify, detect_language, Intent, Language};

use log::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::model::{Document, Header, HeaderField, Project, Question, MAX_QUESTION_DEPTH};

/// Common English words that should not survive a translation away from English
const ENGLISH_MARKERS: &[&str] = &[
    "the", "and", "of", "to", "is", "are", "what", "which", "explain", "describe", "write",
    "answer", "question", "questions", "all", "following", "marks", "with", "for", "each",
];

/// Share of marker words above which translated text is suspected to be English
const ENGLISH_RATIO_THRESHOLD: f64 = 0.25;

/// Result of merging a candidate into a project
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub project: Project,
    pub intent: Intent,
    pub translation_warning: Option<String>,
}

/// Merges candidates into caller projects under the non-destructive rules
#[derive(Debug, Default, Clone)]
pub struct VersionReconciler;

impl VersionReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Merge `candidate` into `original` according to `intent`
    pub fn reconcile(
        &self,
        intent: Intent,
        candidate: Project,
        original: Option<&Project>,
        active_index: usize,
    ) -> Result<Reconciled> {
        let Some(original) = original else {
            debug!("No caller project supplied, returning candidate as-is");
            return Ok(Reconciled {
                project: candidate,
                intent,
                translation_warning: None,
            });
        };

        if original.version(active_index).is_none() {
            return Err(EngineError::invalid_request(format!(
                "activeContentIndex {} is outside a project with {} versions",
                active_index,
                original.version_count()
            )));
        }

        let mut translation_warning = None;
        let merged = match intent {
            Intent::Edit => {
                let replacement = pick_for_edit(&candidate, original, active_index);
                let mut content = original.content.clone();
                content[active_index] = replacement;
                Project { content }
            }
            Intent::AppendCopy => {
                let appended = pick_for_copy(candidate, original, active_index);
                append(original, appended)
            }
            Intent::AppendTranslate(language) => {
                let source = &original.content[active_index];
                let translated = pick_for_translation(candidate, original, active_index);
                let translated = overlay_invariants(source, translated)
                    .map_err(|msg| EngineError::reconciliation(msg, original.clone()))?;
                translation_warning = translation_quality(source, &translated, language);
                if let Some(warning) = &translation_warning {
                    warn!("Translation quality warning: {}", warning);
                }
                append(original, translated)
            }
        };

        verify(intent, original, &merged, active_index)
            .map_err(|msg| EngineError::reconciliation(msg, original.clone()))?;

        info!(
            "Reconciled {} into project: {} -> {} versions",
            intent,
            original.content.len(),
            merged.content.len()
        );

        Ok(Reconciled {
            project: merged,
            intent,
            translation_warning,
        })
    }
}

fn append(original: &Project, document: Document) -> Project {
    let mut content = original.content.clone();
    content.push(document);
    Project { content }
}

fn pick_for_edit(candidate: &Project, original: &Project, active_index: usize) -> Document {
    let docs = &candidate.content;
    if docs.len() == original.content.len() {
        docs[active_index].clone()
    } else if docs.len() == 1 {
        docs[0].clone()
    } else {
        docs.get(active_index)
            .or_else(|| docs.last())
            .cloned()
            .unwrap_or_else(|| original.content[active_index].clone())
    }
}

/// A copy comes from the model only when it returned the full project plus
/// one new version; anything else copies the caller's active version.
fn pick_for_copy(candidate: Project, original: &Project, active_index: usize) -> Document {
    let mut docs = candidate.content;

    if docs.len() > original.content.len() {
        if docs[..original.content.len()] != original.content[..] {
            debug!("Candidate rewrote existing versions; only its last version is kept");
        }
        if let Some(last) = docs.pop() {
            return last;
        }
    }
    debug!("Candidate is not a superset of the project, copying active version {}", active_index);
    original.content[active_index].clone()
}

// The model may return the whole project with the translation at the end,
// the translation alone, or the full set with the active one rewritten.
fn pick_for_translation(candidate: Project, original: &Project, active_index: usize) -> Document {
    let mut docs = candidate.content;

    if docs.len() > original.content.len() {
        if let Some(last) = docs.pop() {
            return last;
        }
    }
    if docs.len() == 1 {
        return docs.remove(0);
    }
    if active_index < docs.len() {
        return docs.swap_remove(active_index);
    }
    debug!("Candidate has no usable version, translating from the active source version");
    original.content[active_index].clone()
}

/// Copy labels, marks, style tags and non-translatable headers from `source`
fn overlay_invariants(source: &Document, mut translated: Document) -> std::result::Result<Document, String> {
    if source.questions.len() != translated.questions.len() {
        return Err(format!(
            "translated version has {} top-level questions, source has {}",
            translated.questions.len(),
            source.questions.len()
        ));
    }

    translated.headers = source
        .headers
        .iter()
        .map(|src| match translated.header(src.field) {
            Some(t) if src.field.is_translatable() => Header {
                field: src.field,
                text: t.text.clone(),
                style_tags: src.style_tags.clone(),
            },
            _ => src.clone(),
        })
        .collect();

    for (src, dst) in source.questions.iter().zip(translated.questions.iter_mut()) {
        overlay_question(src, dst, &src.sequence_label)?;
    }
    Ok(translated)
}

fn overlay_question(src: &Question, dst: &mut Question, path: &str) -> std::result::Result<(), String> {
    if src.children.len() != dst.children.len() {
        return Err(format!(
            "question {} has {} sub-questions after translation, {} before",
            path,
            dst.children.len(),
            src.children.len()
        ));
    }

    dst.sequence_label = src.sequence_label.clone();
    dst.marks = src.marks;
    dst.style_tags = src.style_tags.clone();

    for (s, d) in src.children.iter().zip(dst.children.iter_mut()) {
        overlay_question(s, d, &format!("{}.{}", path, s.sequence_label))?;
    }
    Ok(())
}

fn translation_quality(source: &Document, translated: &Document, language: Language) -> Option<String> {
    let unchanged: Vec<&str> = source
        .headers
        .iter()
        // "90 minutes" reads the same in several languages
        .filter(|h| h.field.is_translatable() && h.field != HeaderField::Duration)
        .filter(|h| !h.text.trim().is_empty())
        .filter(|h| translated.header(h.field).map(|t| t.text == h.text).unwrap_or(true))
        .map(|h| h.field.as_str())
        .collect();

    let source_texts = all_texts(source);
    let translated_texts = all_texts(translated);
    let any_changed = source_texts
        .iter()
        .zip(translated_texts.iter())
        .any(|(a, b)| a != b);

    let mut problems = Vec::new();
    if !unchanged.is_empty() {
        problems.push(format!("headers unchanged from source: {}", unchanged.join(", ")));
    }
    if !any_changed && !source_texts.iter().all(|t| t.trim().is_empty()) {
        problems.push("no text differs from the source version".to_string());
    }
    if !language.is_english() {
        let ratio = english_ratio(&translated_texts);
        if ratio > ENGLISH_RATIO_THRESHOLD {
            problems.push(format!(
                "{:.0}% of words look like English",
                ratio * 100.0
            ));
        }
    }

    if problems.is_empty() {
        None
    } else {
        Some(format!(
            "Translation to {} may be incomplete: {}",
            language.name,
            problems.join("; ")
        ))
    }
}

fn all_texts(document: &Document) -> Vec<&str> {
    let mut texts: Vec<&str> = document
        .headers
        .iter()
        .filter(|h| h.field.is_translatable())
        .map(|h| h.text.as_str())
        .collect();
    texts.extend(document.walk_questions().into_iter().map(|q| q.text.as_str()));
    texts
}

fn english_ratio(texts: &[&str]) -> f64 {
    let mut total = 0usize;
    let mut english = 0usize;
    for text in texts {
        for word in text
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
        {
            total += 1;
            if ENGLISH_MARKERS.contains(&word.to_lowercase().as_str()) {
                english += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        english as f64 / total as f64
    }
}

/// Check the merged project against the version rules
fn verify(
    intent: Intent,
    original: &Project,
    merged: &Project,
    active_index: usize,
) -> std::result::Result<(), String> {
    let before = original.content.len();
    let after = merged.content.len();

    if after < before {
        return Err(format!("merge would drop versions ({} -> {})", before, after));
    }

    match intent {
        Intent::Edit => {
            if after != before {
                return Err(format!("edit changed the version count ({} -> {})", before, after));
            }
            for (i, (a, b)) in original.content.iter().zip(&merged.content).enumerate() {
                if i != active_index && a != b {
                    return Err(format!("edit touched version {} besides the active one", i));
                }
            }
        }
        Intent::AppendCopy | Intent::AppendTranslate(_) => {
            if after != before + 1 {
                return Err(format!(
                    "append must add exactly one version ({} -> {})",
                    before, after
                ));
            }
            if merged.content[..before] != original.content[..] {
                return Err("append modified an existing version".to_string());
            }
        }
    }

    if let Intent::AppendTranslate(_) = intent {
        let source = &original.content[active_index];
        let translated = &merged.content[before];
        let pairs = source.walk_questions().into_iter().zip(translated.walk_questions());
        for (s, t) in pairs {
            if s.marks != t.marks || s.sequence_label != t.sequence_label || s.style_tags != t.style_tags {
                return Err(format!(
                    "translation altered invariant fields of question {}",
                    s.sequence_label
                ));
            }
        }
    }

    for (i, doc) in merged.content.iter().enumerate() {
        if doc.depth() > MAX_QUESTION_DEPTH {
            return Err(format!("version {} nests deeper than {} levels", i, MAX_QUESTION_DEPTH));
        }
        if doc.walk_questions().iter().any(|q| q.marks < 0.0 || !q.marks.is_finite()) {
            return Err(format!("version {} has invalid marks", i));
        }
    }

    Ok(())
}
