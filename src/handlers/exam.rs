//! Exam page and the proctoring endpoint.

use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use std::collections::HashMap;

use super::{after_action, redirect_if_elsewhere, ExamSummary, NavContext};
use crate::domain::QuestionId;
use crate::error::TutorError;
use crate::exam::ExamPhase;
use crate::filters;
use crate::services;
use crate::shell::{AppShell, View};
use crate::state::AppState;

/// Prefix of answer fields in the exam form (`q1`, `q2`, ...)
const ANSWER_PREFIX: &str = "q";

pub struct QuestionView {
  pub id: QuestionId,
  pub prompt: String,
  pub options: Vec<String>,
  pub free_text: bool,
  pub marks: u32,
  pub answer: String,
}

#[derive(Template)]
#[template(path = "exam.html")]
pub struct ExamTemplate {
  pub nav: NavContext,
  pub phase: &'static str,
  pub subject_name: String,
  pub chapter_title: String,
  pub failure: Option<String>,
  pub questions: Vec<QuestionView>,
  pub total_marks: u32,
  pub remaining_secs: u32,
  pub result: Option<ExamSummary>,
}

fn render(shell: &mut AppShell) -> Response {
  let Some(exam) = shell.exam() else {
    let template = ExamTemplate {
      nav: NavContext::build(shell),
      phase: "none",
      subject_name: String::new(),
      chapter_title: String::new(),
      failure: None,
      questions: Vec::new(),
      total_marks: 0,
      remaining_secs: 0,
      result: None,
    };
    return Html(template.render().unwrap_or_default()).into_response();
  };

  let failure = match exam.phase() {
    ExamPhase::LoadFailed { reason } => Some(reason.clone()),
    _ => None,
  };
  let questions = exam
    .document()
    .map(|doc| {
      doc
        .questions
        .iter()
        .map(|q| QuestionView {
          id: q.id,
          prompt: q.prompt.clone(),
          options: q.options.clone().unwrap_or_default(),
          free_text: q.is_free_text(),
          marks: q.marks,
          answer: exam.answer(q.id).unwrap_or_default().to_string(),
        })
        .collect()
    })
    .unwrap_or_default();

  let phase = exam.phase().as_str();
  let subject_name = exam.subject_name().to_string();
  let chapter_title = exam.chapter_title().to_string();
  let total_marks = exam.document().map_or(0, |doc| doc.total_marks());
  let remaining_secs = exam.remaining_secs();
  let result = exam.result().map(ExamSummary::new);

  let template = ExamTemplate {
    nav: NavContext::build(shell),
    phase,
    subject_name,
    chapter_title,
    failure,
    questions,
    total_marks,
    remaining_secs,
    result,
  };
  Html(template.render().unwrap_or_default()).into_response()
}

pub async fn exam_page(State(state): State<AppState>) -> Response {
  state.with_shell(|shell| {
    if let Some(redirect) = redirect_if_elsewhere(shell, View::Exam) {
      return redirect;
    }
    render(shell)
  })
}

pub async fn start_exam(State(state): State<AppState>) -> Response {
  crate::profile_handler!("POST", "/exam/start");

  let result = services::exam::start_exam(&state).map(|_| ());
  after_action(&state, result)
}

pub async fn retry_exam(State(state): State<AppState>) -> Response {
  let result = services::exam::retry_exam(&state).map(|_| ());
  after_action(&state, result)
}

#[derive(Deserialize)]
pub struct AnswerForm {
  pub question_id: QuestionId,
  pub answer: String,
}

/// Autosave one answer while the exam is running. Called by `proctor.js`.
pub async fn save_answer(State(state): State<AppState>, Form(form): Form<AnswerForm>) -> Response {
  match state.with_shell(|shell| shell.submit_exam_answer(form.question_id, form.answer)) {
    Ok(()) => StatusCode::NO_CONTENT.into_response(),
    Err(e) => e.into_response(),
  }
}

/// Pull `q{id}` answer fields out of the submitted exam form
fn answers_from_form(form: HashMap<String, String>) -> Result<Vec<(QuestionId, String)>, TutorError> {
  let mut answers = form
    .into_iter()
    .filter_map(|(key, value)| key.strip_prefix(ANSWER_PREFIX).map(|id| (id.to_string(), value)))
    .map(|(id, value)| {
      id.parse::<QuestionId>()
        .map(|id| (id, value))
        .map_err(|_| TutorError::BadRequest(format!("invalid answer field '{}{}'", ANSWER_PREFIX, id)))
    })
    .collect::<Result<Vec<_>, _>>()?;
  answers.sort_by_key(|(id, _)| *id);
  Ok(answers)
}

/// Final answer form: submits a running exam, or rescores one that just timed out
pub async fn submit_exam(
  State(state): State<AppState>,
  Form(form): Form<HashMap<String, String>>,
) -> Response {
  crate::profile_handler!("POST", "/exam/submit");

  let result = answers_from_form(form)
    .and_then(|answers| state.with_shell(|shell| shell.submit_exam_form(answers)).map(|_| ()));
  after_action(&state, result)
}

/// Proctoring beacon: the exam window lost focus
pub async fn focus_lost(State(state): State<AppState>) -> StatusCode {
  crate::profile_handler!("POST", "/exam/focus-lost");

  state.with_shell(|shell| shell.exam_focus_lost());
  StatusCode::NO_CONTENT
}
