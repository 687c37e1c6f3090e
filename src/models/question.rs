// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Exam languages with a question set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Tagalog,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Tagalog];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Tagalog => "tagalog",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "english" => Ok(Language::English),
            "tagalog" => Ok(Language::Tagalog),
            other => Err(format!("Unsupported language '{}'", other)),
        }
    }
}

/// One exam item, including its answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Prompt text.
    pub question: String,

    /// Options in display order.
    pub options: Vec<String>,

    /// The correct option; always one of `options`.
    pub answer: String,

    /// Optional image asset shown with the prompt (e.g. a road sign).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// DTO for sending question to client (excludes answer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question: q.question.clone(),
            options: q.options.clone(),
            image: q.image.clone(),
        }
    }
}

/// Checks the invariants a loaded question set must hold.
///
/// * At least one question.
/// * Identifiers are unique.
/// * Every question has options and its answer is one of them.
pub fn validate_question_set(questions: &[Question]) -> Result<(), String> {
    if questions.is_empty() {
        return Err("question set is empty".to_string());
    }

    let mut seen = std::collections::HashSet::new();
    for q in questions {
        if !seen.insert(q.id) {
            return Err(format!("duplicate question id {}", q.id));
        }
        if q.options.is_empty() {
            return Err(format!("question {} has no options", q.id));
        }
        if !q.options.contains(&q.answer) {
            return Err(format!("answer of question {} is not one of its options", q.id));
        }
    }
    Ok(())
}
