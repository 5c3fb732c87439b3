//! Shared documents and settings for tests

use std::time::Duration;

use serde_json::json;

use crate::config::EngineConfig;
use crate::model::{Document, Header, HeaderField, Project, Question};

pub fn english_document() -> Document {
    Document {
        headers: vec![
            Header::new(HeaderField::CourseName, "Physics"),
            Header::new(HeaderField::ExamType, "Final examination"),
            Header::new(HeaderField::Period, "Spring term"),
            Header::new(HeaderField::SubjectName, "Mechanics"),
            Header::new(HeaderField::TotalMarks, "20"),
            Header::new(HeaderField::Duration, "2 hours"),
            Header::new(HeaderField::Notes, "Answer all questions"),
            Header::new(HeaderField::SubjectCode, "PHY101"),
        ],
        questions: vec![
            Question::new("1", "Explain inertia", 10.0),
            Question::new("2", "Describe friction", 0.0).with_children(vec![
                Question::new("a", "Static friction", 5.0),
                Question::new("b", "Kinetic friction", 5.0),
            ]),
        ],
    }
}

pub fn french_document() -> Document {
    let mut doc = english_document();
    let texts = [
        "Physique",
        "Examen final",
        "Trimestre de printemps",
        "Mécanique",
        "20",
        "2 heures",
        "Répondez à toutes les questions",
        "PHY101",
    ];
    for (header, text) in doc.headers.iter_mut().zip(texts) {
        header.text = text.to_string();
    }
    doc.questions[0].text = "Expliquez l'inertie".to_string();
    doc.questions[1].text = "Décrivez le frottement".to_string();
    doc.questions[1].children[0].text = "Frottement statique".to_string();
    doc.questions[1].children[1].text = "Frottement cinétique".to_string();
    doc
}

pub fn english_project() -> Project {
    Project::new(english_document())
}

/// Well-formed upstream reply carrying `project`
pub fn envelope(answer: &str, project: &Project) -> String {
    json!({ "answer": answer, "project": project }).to_string()
}

/// Engine settings with millisecond backoff so retry tests stay fast
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        backoff_unit: Duration::from_millis(1),
        deadline: Duration::from_secs(5),
        ..EngineConfig::default()
    }
}
