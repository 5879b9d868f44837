//! Exam documents produced by the gateway.
//!
//! The gateway returns JSON shaped like
//! `{"questions": [{"id", "question", "options"?, "correctAnswer", "marks"}]}`.
//! That payload is an external contract, so it is parsed into [`ExamPayload`]
//! and validated before becoming an [`ExamDocument`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ExamGenerationError;

/// Version of the exam payload contract this crate understands
pub const EXAM_SCHEMA_VERSION: u32 = 1;

pub type QuestionId = u32;

/// Upper bound on the marks a single question may carry
pub const MAX_MARKS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
  pub id: QuestionId,
  pub prompt: String,
  /// `None` means a free-text answer
  pub options: Option<Vec<String>>,
  pub correct_answer: String,
  pub marks: u32,
}

impl Question {
  pub fn is_free_text(&self) -> bool {
    self.options.is_none()
  }

  /// Case-sensitive, whole-string comparison against the key
  pub fn is_correct(&self, answer: &str) -> bool {
    answer == self.correct_answer
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamDocument {
  pub questions: Vec<Question>,
}

impl ExamDocument {
  pub fn question(&self, id: QuestionId) -> Option<&Question> {
    self.questions.iter().find(|q| q.id == id)
  }

  pub fn total_marks(&self) -> u32 {
    self
      .questions
      .iter()
      .fold(0u32, |total, q| total.saturating_add(q.marks))
  }

  /// Parse and validate a raw JSON payload from the gateway
  pub fn from_json(raw: &str) -> Result<Self, ExamGenerationError> {
    let payload: ExamPayload = serde_json::from_str(raw)
      .map_err(|e| ExamGenerationError::Malformed(format!("invalid JSON: {}", e)))?;
    payload.try_into()
  }
}

/// Wire format of a generated exam (schema version 1)
#[derive(Debug, Deserialize)]
pub struct ExamPayload {
  pub questions: Vec<QuestionPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
  pub id: f64,
  pub question: String,
  #[serde(default)]
  pub options: Option<Vec<String>>,
  pub correct_answer: String,
  pub marks: f64,
}

fn whole_number(value: f64, what: &str, index: usize) -> Result<u32, ExamGenerationError> {
  if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
    Ok(value as u32)
  } else {
    Err(ExamGenerationError::Malformed(format!(
      "question #{} has invalid {}: {}",
      index + 1,
      what,
      value
    )))
  }
}

impl TryFrom<ExamPayload> for ExamDocument {
  type Error = ExamGenerationError;

  fn try_from(payload: ExamPayload) -> Result<Self, Self::Error> {
    if payload.questions.is_empty() {
      return Err(ExamGenerationError::Malformed("exam has no questions".into()));
    }

    let mut seen = HashSet::new();
    let mut questions = Vec::with_capacity(payload.questions.len());
    let mut total_marks = 0u32;

    for (index, q) in payload.questions.into_iter().enumerate() {
      let id = whole_number(q.id, "id", index)?;
      if !seen.insert(id) {
        return Err(ExamGenerationError::Malformed(format!("duplicate question id {}", id)));
      }
      let marks = whole_number(q.marks, "marks", index)?;
      if marks > MAX_MARKS {
        return Err(ExamGenerationError::Malformed(format!(
          "question {} carries {} marks (limit {})",
          id, marks, MAX_MARKS
        )));
      }
      total_marks = total_marks
        .checked_add(marks)
        .ok_or_else(|| ExamGenerationError::Malformed("total marks overflow".into()))?;

      if q.question.trim().is_empty() {
        return Err(ExamGenerationError::Malformed(format!(
          "question {} has no text",
          id
        )));
      }
      if q.correct_answer.trim().is_empty() {
        return Err(ExamGenerationError::Malformed(format!(
          "question {} has no answer key",
          id
        )));
      }
      // An empty option list is treated as a free-text question
      let options = q.options.filter(|opts| !opts.is_empty());

      questions.push(Question {
        id,
        prompt: q.question,
        options,
        correct_answer: q.correct_answer,
        marks,
      });
    }

    Ok(Self { questions })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"{
    "questions": [
      {"id": 1, "question": "Capital of Myanmar?", "options": ["Yangon", "Naypyidaw"], "correctAnswer": "Naypyidaw", "marks": 5},
      {"id": 2, "question": "Explain the monsoon.", "correctAnswer": "Seasonal wind", "marks": 3}
    ]
  }"#;

  #[test]
  fn test_parse_valid_payload() {
    let exam = ExamDocument::from_json(SAMPLE).unwrap();
    assert_eq!(exam.questions.len(), 2);
    assert!(!exam.questions[0].is_free_text());
    assert!(exam.questions[1].is_free_text());
    assert_eq!(exam.total_marks(), 8);
  }

  #[test]
  fn test_float_ids_accepted_when_whole() {
    let raw = r#"{"questions":[{"id":1.0,"question":"Q","correctAnswer":"A","marks":2.0}]}"#;
    let exam = ExamDocument::from_json(raw).unwrap();
    assert_eq!(exam.questions[0].id, 1);
    assert_eq!(exam.questions[0].marks, 2);
  }

  #[test]
  fn test_rejects_non_json() {
    let err = ExamDocument::from_json("Here is your exam!").unwrap_err();
    assert!(matches!(err, ExamGenerationError::Malformed(_)));
  }

  #[test]
  fn test_rejects_missing_answer_key() {
    let raw = r#"{"questions":[{"id":1,"question":"Q","marks":2}]}"#;
    assert!(ExamDocument::from_json(raw).is_err());
  }

  #[test]
  fn test_rejects_empty_exam() {
    let err = ExamDocument::from_json(r#"{"questions":[]}"#).unwrap_err();
    assert!(err.to_string().contains("no questions"));
  }

  #[test]
  fn test_rejects_duplicate_ids() {
    let raw = r#"{"questions":[
      {"id":1,"question":"Q1","correctAnswer":"A","marks":1},
      {"id":1,"question":"Q2","correctAnswer":"B","marks":1}
    ]}"#;
    let err = ExamDocument::from_json(raw).unwrap_err();
    assert!(err.to_string().contains("duplicate"));
  }

  #[test]
  fn test_rejects_negative_or_fractional_marks() {
    let negative = r#"{"questions":[{"id":1,"question":"Q","correctAnswer":"A","marks":-1}]}"#;
    let fractional = r#"{"questions":[{"id":1,"question":"Q","correctAnswer":"A","marks":1.5}]}"#;
    assert!(ExamDocument::from_json(negative).is_err());
    assert!(ExamDocument::from_json(fractional).is_err());
  }

  #[test]
  fn test_rejects_marks_over_limit() {
    let huge = r#"{"questions":[
      {"id":1,"question":"Q1","correctAnswer":"A","marks":4294967295},
      {"id":2,"question":"Q2","correctAnswer":"B","marks":1}
    ]}"#;
    let err = ExamDocument::from_json(huge).unwrap_err();
    assert!(err.to_string().contains("limit"));

    let just_over = r#"{"questions":[{"id":1,"question":"Q","correctAnswer":"A","marks":1001}]}"#;
    assert!(ExamDocument::from_json(just_over).is_err());

    let at_limit = r#"{"questions":[
      {"id":1,"question":"Q1","correctAnswer":"A","marks":1000},
      {"id":2,"question":"Q2","correctAnswer":"B","marks":1000}
    ]}"#;
    assert_eq!(ExamDocument::from_json(at_limit).unwrap().total_marks(), 2000);
  }

  #[test]
  fn test_empty_options_become_free_text() {
    let raw = r#"{"questions":[{"id":1,"question":"Q","options":[],"correctAnswer":"A","marks":1}]}"#;
    let exam = ExamDocument::from_json(raw).unwrap();
    assert!(exam.questions[0].is_free_text());
  }

  #[test]
  fn test_answer_match_is_case_sensitive() {
    let exam = ExamDocument::from_json(SAMPLE).unwrap();
    let q = exam.question(1).unwrap();
    assert!(q.is_correct("Naypyidaw"));
    assert!(!q.is_correct("naypyidaw"));
    assert!(!q.is_correct("Naypyidaw "));
  }
}
