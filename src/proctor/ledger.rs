// src/proctor/ledger.rs

use std::collections::{HashMap, HashSet};

use crate::models::question::Question;

/// Per-question selected answers for one session.
#[derive(Debug, Clone, Default)]
pub struct AnswerLedger {
    known_ids: HashSet<i64>,
    entries: HashMap<i64, String>,
}

impl AnswerLedger {
    /// Creates an empty ledger accepting only ids from the loaded question set.
    pub fn for_questions(questions: &[Question]) -> Self {
        Self {
            known_ids: questions.iter().map(|q| q.id).collect(),
            entries: HashMap::new(),
        }
    }

    /// Records `option` for `question_id`, replacing any earlier selection.
    ///
    /// Returns `false` (and records nothing) when the id is not part of the set.
    pub fn select(&mut self, question_id: i64, option: impl Into<String>) -> bool {
        if !self.known_ids.contains(&question_id) {
            return false;
        }
        self.entries.insert(question_id, option.into());
        true
    }

    pub fn get(&self, question_id: i64) -> Option<&str> {
        self.entries.get(&question_id).map(String::as_str)
    }

    pub fn answered(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &HashMap<i64, String> {
        &self.entries
    }
}

/// Counts questions whose recorded answer equals the correct option exactly.
pub fn compute_score(questions: &[Question], ledger: &AnswerLedger) -> u32 {
    questions
        .iter()
        .filter(|q| ledger.get(q.id) == Some(q.answer.as_str()))
        .count() as u32
}
