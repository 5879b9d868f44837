//! Timetable editor and the lock action.

use askama::Template;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use axum::Form;

use super::{after_action, redirect_if_elsewhere, NavContext};
use crate::domain::timetable::default_proposal;
use crate::domain::{ClockTime, SubjectId, TimetableEntry};
use crate::error::TutorError;
use crate::filters;
use crate::shell::{Action, View};
use crate::state::AppState;

/// Blank rows offered below the proposal so slots can be added
const SPARE_ROWS: usize = 2;

pub struct SlotRow {
  pub subject: &'static str,
  pub subject_name: String,
  pub start: String,
  pub end: String,
  pub duration_minutes: u32,
}

pub struct SubjectOption {
  pub id: &'static str,
  pub name: String,
}

#[derive(Template)]
#[template(path = "timetable.html")]
pub struct TimetableTemplate {
  pub nav: NavContext,
  pub fixed: bool,
  pub rows: Vec<SlotRow>,
  pub options: Vec<SubjectOption>,
}

pub async fn timetable_page(State(state): State<AppState>) -> Response {
  state.with_shell(|shell| {
    if let Some(redirect) = redirect_if_elsewhere(shell, View::Timetable) {
      return redirect;
    }

    let name_of = |id: SubjectId| {
      shell
        .subject(id)
        .map_or_else(|| id.to_string(), |s| s.name.clone())
    };
    let (fixed, entries) = match shell.timetable().timetable() {
      Some(timetable) => (true, timetable.entries().to_vec()),
      None => (false, default_proposal()),
    };
    let mut rows: Vec<SlotRow> = entries
      .iter()
      .map(|e| SlotRow {
        subject: e.subject.as_str(),
        subject_name: name_of(e.subject),
        start: e.start.to_string(),
        end: e.end.to_string(),
        duration_minutes: e.duration_minutes,
      })
      .collect();
    if !fixed {
      rows.extend((0..SPARE_ROWS).map(|_| SlotRow {
        subject: "",
        subject_name: String::new(),
        start: String::new(),
        end: String::new(),
        duration_minutes: 0,
      }));
    }
    let options = SubjectId::ALL
      .iter()
      .map(|id| SubjectOption {
        id: id.as_str(),
        name: name_of(*id),
      })
      .collect();

    let template = TimetableTemplate {
      nav: NavContext::build(shell),
      fixed,
      rows,
      options,
    };
    Html(template.render().unwrap_or_default()).into_response()
  })
}

/// Turn the editor's repeated `subject`/`start`/`end` fields into slots.
///
/// Each `subject` field opens a new row. Rows whose subject is left blank are
/// skipped, so the spare rows can stay empty.
pub fn parse_slots(fields: &[(String, String)]) -> Result<Vec<TimetableEntry>, TutorError> {
  #[derive(Default)]
  struct Row<'a> {
    subject: &'a str,
    start: &'a str,
    end: &'a str,
  }

  let mut rows: Vec<Row> = Vec::new();
  for (key, value) in fields {
    match key.as_str() {
      "subject" => rows.push(Row {
        subject: value.trim(),
        ..Row::default()
      }),
      "start" | "end" => {
        let Some(row) = rows.last_mut() else {
          return Err(TutorError::BadRequest(format!("'{}' given before any subject", key)));
        };
        if key == "start" {
          row.start = value.trim();
        } else {
          row.end = value.trim();
        }
      }
      _ => {}
    }
  }

  rows
    .into_iter()
    .filter(|row| !row.subject.is_empty())
    .map(|row| -> Result<TimetableEntry, TutorError> {
      let subject = SubjectId::from_str(row.subject).ok_or_else(|| TutorError::NotFound {
        kind: "subject",
        value: row.subject.to_string(),
      })?;
      let start = ClockTime::parse(row.start)?;
      let end = ClockTime::parse(row.end)?;
      Ok(TimetableEntry::new(subject, start, end))
    })
    .collect()
}

pub async fn lock_timetable(
  State(state): State<AppState>,
  Form(fields): Form<Vec<(String, String)>>,
) -> Response {
  crate::profile_handler!("POST", "/timetable");

  let result = parse_slots(&fields).and_then(|entries| state.dispatch(Action::LockTimetable(entries)));
  after_action(&state, result)
}
