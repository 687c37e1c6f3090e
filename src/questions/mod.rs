// src/questions/mod.rs

pub mod sql;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::question::{Language, Question, validate_question_set},
};

pub use sql::SqlQuestionBank;

/// Source of exam questions for a language.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Returns the ordered question set for `language`.
    async fn questions(&self, language: Language) -> Result<Vec<Question>, AppError>;
}

const ENGLISH_SET: &str = include_str!("../../assets/questions/english.json");
const TAGALOG_SET: &str = include_str!("../../assets/questions/tagalog.json");

/// Question sets compiled into the binary.
#[derive(Debug, Clone)]
pub struct StaticQuestionBank {
    sets: HashMap<Language, Vec<Question>>,
}

impl StaticQuestionBank {
    /// Parses and validates the embedded English and Tagalog sets.
    pub fn builtin() -> Result<Self, AppError> {
        let mut sets = HashMap::new();
        sets.insert(Language::English, parse_set(Language::English, ENGLISH_SET)?);
        sets.insert(Language::Tagalog, parse_set(Language::Tagalog, TAGALOG_SET)?);
        Ok(Self { sets })
    }

    /// Bank with caller-provided sets, validated like the built-in ones.
    pub fn from_sets(sets: HashMap<Language, Vec<Question>>) -> Result<Self, AppError> {
        for (language, questions) in &sets {
            validate_question_set(questions).map_err(|e| {
                AppError::InternalServerError(format!("Invalid {} question set: {}", language, e))
            })?;
        }
        Ok(Self { sets })
    }
}

#[async_trait]
impl QuestionBank for StaticQuestionBank {
    async fn questions(&self, language: Language) -> Result<Vec<Question>, AppError> {
        self.sets
            .get(&language)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No questions for language '{}'", language)))
    }
}

fn parse_set(language: Language, raw: &str) -> Result<Vec<Question>, AppError> {
    let questions: Vec<Question> = serde_json::from_str(raw).map_err(|e| {
        AppError::InternalServerError(format!("Failed to parse {} question set: {}", language, e))
    })?;
    validate_question_set(&questions).map_err(|e| {
        AppError::InternalServerError(format!("Invalid {} question set: {}", language, e))
    })?;
    Ok(questions)
}
