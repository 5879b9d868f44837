pub mod classroom;
pub mod exam;
pub mod timetable;

use askama::Template;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config;
use crate::domain::timetable::TimetableEntry;
use crate::domain::SubjectId;
use crate::error::TutorError;
use crate::exam::{ExamOutcome, ExamResult};
use crate::filters;
use crate::shell::{Action, AppShell, NoticeLevel, Notification, View};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(dashboard))
    .route("/health", get(health))
    .route("/subject/{id}", post(select_subject))
    .route("/view/{view}", post(select_view))
    .route("/classroom", get(classroom::classroom_page))
    .route(
      "/classroom/upload",
      post(classroom::upload).layer(DefaultBodyLimit::max(config::MAX_UPLOAD_BYTES)),
    )
    .route("/classroom/message", post(classroom::send_message))
    .route("/classroom/prompt/{chip}", post(classroom::send_prompt))
    .route("/classroom/chapter/{id}", post(classroom::select_chapter))
    .route("/classroom/chapter/{id}/complete", post(classroom::toggle_completed))
    .route("/timetable", get(timetable::timetable_page).post(timetable::lock_timetable))
    .route("/exam", get(exam::exam_page))
    .route("/exam/start", post(exam::start_exam))
    .route("/exam/retry", post(exam::retry_exam))
    .route("/exam/answer", post(exam::save_answer))
    .route("/exam/submit", post(exam::submit_exam))
    .route("/exam/focus-lost", post(exam::focus_lost))
    .nest_service("/static", ServeDir::new("static"))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ==================== Shared page context ====================

/// Sidebar entry for one subject
pub struct SubjectLink {
  pub id: &'static str,
  pub name: String,
  pub local_name: String,
  pub color: String,
  pub active: bool,
}

/// Navigation data every page renders: sidebar, active view and flash messages
pub struct NavContext {
  pub view: &'static str,
  pub subjects: Vec<SubjectLink>,
  pub notifications: Vec<Notification>,
  pub timetable_fixed: bool,
  pub exam_running: bool,
}

impl NavContext {
  /// Build from the shell, consuming pending notifications
  pub fn build(shell: &mut AppShell) -> Self {
    let current = shell.current_subject_id();
    let subjects = shell
      .subjects()
      .iter()
      .map(|s| SubjectLink {
        id: s.id.as_str(),
        name: s.name.clone(),
        local_name: s.local_name.clone(),
        color: s.color.clone(),
        active: s.id == current,
      })
      .collect();

    Self {
      view: shell.view().as_str(),
      subjects,
      timetable_fixed: shell.timetable().is_fixed(),
      exam_running: shell.exam_running(),
      notifications: shell.take_notifications(),
    }
  }
}

/// Redirect to wherever the shell says the student should be. Validation
/// failures become a notification instead of an error page.
pub(crate) fn after_action(state: &AppState, result: Result<(), TutorError>) -> Response {
  if let Err(e) = result {
    if e.status().is_server_error() {
      return e.into_response();
    }
    tracing::debug!("Action rejected: {}", e);
    state.with_shell(|shell| shell.notify(NoticeLevel::Error, e.to_string()));
  }
  let path = state.read_shell(|shell| shell.view().path());
  Redirect::to(path).into_response()
}

/// Pages follow the shell: asking for a view that is not active lands on the active one
pub(crate) fn redirect_if_elsewhere(shell: &AppShell, view: View) -> Option<Response> {
  (shell.view() != view).then(|| Redirect::to(shell.view().path()).into_response())
}

// ==================== Dashboard ====================

pub struct SubjectCard {
  pub id: &'static str,
  pub name: String,
  pub local_name: String,
  pub color: String,
  pub chapters: usize,
  pub chapters_completed: usize,
  pub images: usize,
}

pub struct SlotView {
  pub subject: String,
  pub start: String,
  pub end: String,
}

impl SlotView {
  fn new(shell: &AppShell, entry: &TimetableEntry) -> Self {
    Self {
      subject: shell
        .subject(entry.subject)
        .map_or_else(|| entry.subject.to_string(), |s| s.name.clone()),
      start: entry.start.to_string(),
      end: entry.end.to_string(),
    }
  }
}

pub struct ExamSummary {
  pub subject: String,
  pub chapter_title: String,
  pub score: u32,
  pub total_marks: u32,
  pub outcome: &'static str,
  pub needs_review: usize,
}

impl ExamSummary {
  pub fn new(result: &ExamResult) -> Self {
    Self {
      subject: result.subject.to_string(),
      chapter_title: result.chapter_title.clone(),
      score: result.score,
      total_marks: result.total_marks,
      outcome: match result.outcome {
        ExamOutcome::Submitted => "Submitted",
        ExamOutcome::TimedOut => "Time up",
        ExamOutcome::Disqualified => "Disqualified",
      },
      needs_review: result.needs_review.len(),
    }
  }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
  pub nav: NavContext,
  pub cards: Vec<SubjectCard>,
  pub clock: String,
  pub now_slot: Option<SlotView>,
  pub next_slot: Option<SlotView>,
  pub last_exam: Option<ExamSummary>,
}

pub async fn dashboard(State(state): State<AppState>) -> Response {
  let now = state.clock.now();
  state.with_shell(|shell| {
    if let Some(redirect) = redirect_if_elsewhere(shell, View::Dashboard) {
      return redirect;
    }

    let cards = shell
      .subjects()
      .iter()
      .map(|s| SubjectCard {
        id: s.id.as_str(),
        name: s.name.clone(),
        local_name: s.local_name.clone(),
        color: s.color.clone(),
        chapters: s.chapters.len(),
        chapters_completed: s.chapters.iter().filter(|c| c.completed).count(),
        images: s.chapters.iter().map(|c| c.image_count()).sum(),
      })
      .collect();

    let (now_slot, next_slot) = {
      let shell: &AppShell = shell;
      match shell.timetable().timetable() {
        Some(timetable) => (
          timetable.current_slot(now).map(|e| SlotView::new(shell, e)),
          timetable.next_slot(now).map(|e| SlotView::new(shell, e)),
        ),
        None => (None, None),
      }
    };

    let template = DashboardTemplate {
      cards,
      clock: now.to_string(),
      now_slot,
      next_slot,
      last_exam: shell.last_exam().map(ExamSummary::new),
      nav: NavContext::build(shell),
    };
    Html(template.render().unwrap_or_default()).into_response()
  })
}

// ==================== Navigation ====================

pub async fn select_subject(State(state): State<AppState>, Path(id): Path<String>) -> Response {
  crate::profile_handler!("POST", format!("/subject/{}", id));

  let Some(subject) = SubjectId::from_str(&id) else {
    return TutorError::NotFound {
      kind: "subject",
      value: id,
    }
    .into_response();
  };
  let result = state.with_shell(|shell| {
    shell.dispatch(Action::SelectSubject(subject))?;
    shell.dispatch(Action::SelectView(View::Classroom))
  });
  after_action(&state, result)
}

pub async fn select_view(State(state): State<AppState>, Path(view): Path<String>) -> Response {
  let Some(view) = View::from_str(&view) else {
    return TutorError::NotFound {
      kind: "view",
      value: view,
    }
    .into_response();
  };
  let result = state.dispatch(Action::SelectView(view));
  after_action(&state, result)
}

pub async fn health() -> &'static str {
  "ok"
}
