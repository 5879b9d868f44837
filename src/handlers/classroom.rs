//! Classroom page: lesson images, chat transcript and prompt chips.

use askama::Template;
use axum::extract::{Multipart, Path, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use super::{after_action, redirect_if_elsewhere, NavContext};
use crate::classroom::ClassroomPhase;
use crate::domain::RawUpload;
use crate::error::TutorError;
use crate::filters;
use crate::gateway::PromptChip;
use crate::services;
use crate::shell::{Action, View};
use crate::state::AppState;

/// Multipart field carrying lesson images
pub const UPLOAD_FIELD: &str = "images";

pub struct ChapterTab {
  pub id: u32,
  pub title: String,
  pub completed: bool,
  pub image_count: usize,
  pub active: bool,
}

pub struct ChatLine {
  pub from_student: bool,
  pub text: String,
}

pub struct ChipButton {
  pub id: &'static str,
  pub label: &'static str,
}

#[derive(Template)]
#[template(path = "classroom.html")]
pub struct ClassroomTemplate {
  pub nav: NavContext,
  pub subject_name: String,
  pub subject_local_name: String,
  pub subject_color: String,
  pub memorization: bool,
  pub chapters: Vec<ChapterTab>,
  pub chapter_id: u32,
  pub chapter_title: String,
  pub chapter_completed: bool,
  pub images: Vec<String>,
  pub transcript: Vec<ChatLine>,
  pub phase: &'static str,
  pub busy: bool,
  pub chips: Vec<ChipButton>,
}

fn phase_name(phase: ClassroomPhase) -> &'static str {
  match phase {
    ClassroomPhase::NoImages => "no_images",
    ClassroomPhase::HasImages => "has_images",
    ClassroomPhase::Conversing => "conversing",
  }
}

pub async fn classroom_page(State(state): State<AppState>) -> Response {
  let rendered = state.with_shell(|shell| -> Result<Response, TutorError> {
    if let Some(redirect) = redirect_if_elsewhere(shell, View::Classroom) {
      return Ok(redirect);
    }

    let session = shell.open_classroom()?;
    let phase = phase_name(session.phase());
    let busy = session.is_busy();
    let transcript = session
      .transcript()
      .iter()
      .map(|m| ChatLine {
        from_student: m.is_user(),
        text: m.text.clone(),
      })
      .collect();

    let subject = shell.current_subject()?;
    let chapter = shell.current_chapter()?;
    let chapters = subject
      .chapters
      .iter()
      .map(|c| ChapterTab {
        id: c.id,
        title: c.title.clone(),
        completed: c.completed,
        image_count: c.image_count(),
        active: c.id == chapter.id,
      })
      .collect();
    let subject_name = subject.name.clone();
    let subject_local_name = subject.local_name.clone();
    let subject_color = subject.color.clone();
    let memorization = subject.id.is_memorization();
    let chapter_id = chapter.id;
    let chapter_title = chapter.title.clone();
    let chapter_completed = chapter.completed;
    let images = chapter.images.iter().map(|img| img.data_url()).collect();

    let template = ClassroomTemplate {
      nav: NavContext::build(shell),
      subject_name,
      subject_local_name,
      subject_color,
      memorization,
      chapters,
      chapter_id,
      chapter_title,
      chapter_completed,
      images,
      transcript,
      phase,
      busy,
      chips: PromptChip::ALL
        .iter()
        .map(|chip| ChipButton {
          id: chip.as_str(),
          label: chip.label(),
        })
        .collect(),
    };
    Ok(Html(template.render().unwrap_or_default()).into_response())
  });
  rendered.unwrap_or_else(IntoResponse::into_response)
}

/// Read every file in the `images` field, in the order the browser sent them
async fn read_uploads(multipart: &mut Multipart) -> Result<Vec<RawUpload>, TutorError> {
  let mut uploads = Vec::new();
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| TutorError::BadRequest(format!("Failed to read upload: {}", e)))?
  {
    if field.name() != Some(UPLOAD_FIELD) {
      continue;
    }
    let file_name = field.file_name().unwrap_or_default().to_string();
    let bytes = field
      .bytes()
      .await
      .map_err(|e| TutorError::BadRequest(format!("Failed to read upload: {}", e)))?;

    // An empty file input still submits one nameless, empty part
    if file_name.is_empty() && bytes.is_empty() {
      continue;
    }
    uploads.push(RawUpload::new(file_name, bytes.to_vec()));
  }
  Ok(uploads)
}

pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
  crate::profile_handler!("POST", "/classroom/upload");

  let result = async {
    let uploads = read_uploads(&mut multipart).await?;
    services::classroom::upload_images(&state, uploads).await?;
    Ok::<(), TutorError>(())
  }
  .await;
  after_action(&state, result)
}

#[derive(Deserialize)]
pub struct MessageForm {
  pub text: String,
}

pub async fn send_message(State(state): State<AppState>, Form(form): Form<MessageForm>) -> Response {
  crate::profile_handler!("POST", "/classroom/message");

  let result = services::classroom::send_message(&state, &form.text).await;
  after_action(&state, result)
}

pub async fn send_prompt(State(state): State<AppState>, Path(chip): Path<String>) -> Response {
  let Some(chip) = PromptChip::from_str(&chip) else {
    return TutorError::NotFound {
      kind: "prompt",
      value: chip,
    }
    .into_response();
  };
  let result = services::classroom::send_chip(&state, chip).await;
  after_action(&state, result)
}

pub async fn select_chapter(State(state): State<AppState>, Path(id): Path<u32>) -> Response {
  let result = state.dispatch(Action::SelectChapter(id));
  after_action(&state, result)
}

pub async fn toggle_completed(State(state): State<AppState>, Path(id): Path<u32>) -> Response {
  let result = state.dispatch(Action::ToggleChapterCompleted(id));
  after_action(&state, result)
}
