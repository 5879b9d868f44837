//! Classroom turn-taking and lesson image uploads.

use crate::classroom::PendingTurn;
use crate::domain::image::{decode_batch, RawUpload};
use crate::error::{ClassroomError, TutorError};
use crate::gateway::PromptChip;
#[cfg(feature = "profiling")]
use crate::profiling::EventType;
use crate::state::AppState;

/// Decode a batch of uploads and append it to the current chapter.
///
/// Either every image is appended or none is. When the chapter had no
/// material before, the opening lesson prompt is sent once. Returns the
/// number of images added.
pub async fn upload_images(state: &AppState, uploads: Vec<RawUpload>) -> Result<usize, TutorError> {
  if uploads.is_empty() {
    return Ok(0);
  }
  let ticket = state.with_shell(|shell| shell.upload_ticket())?;

  let images = crate::profile_scope!("decode_batch", {
    tokio::task::spawn_blocking(move || decode_batch(&uploads))
      .await
      .map_err(|e| TutorError::Internal(format!("image decoding task failed: {}", e)))?
  })
  .map_err(|e| {
    tracing::warn!("Upload rejected: {}", e);
    ClassroomError::from(e)
  })?;
  let added = images.len();

  let opening = state.with_shell(|shell| shell.commit_upload(ticket, images))?;
  if let Some(turn) = opening {
    run_turn(state, turn).await;
  }
  Ok(added)
}

/// Send a student message and wait for the teacher's reply
pub async fn send_message(state: &AppState, text: &str) -> Result<(), TutorError> {
  let turn = state.with_shell(|shell| shell.begin_turn(text))?;
  run_turn(state, turn).await;
  Ok(())
}

pub async fn send_chip(state: &AppState, chip: PromptChip) -> Result<(), TutorError> {
  send_message(state, chip.prompt()).await
}

/// Ask the gateway and hand the reply back. Failures become the apology line.
async fn run_turn(state: &AppState, turn: PendingTurn) {
  #[cfg(feature = "profiling")]
  crate::profile_log!(EventType::GatewayCall {
    operation: "converse".into(),
    images: turn.images.len(),
  });

  let started = std::time::Instant::now();
  let reply = state
    .gateway
    .converse(&turn.prompt, &turn.images, &turn.context)
    .await;
  tracing::debug!(
    "Teacher replied in {}ms (ok={})",
    started.elapsed().as_millis(),
    reply.is_ok()
  );

  #[cfg(feature = "profiling")]
  crate::profile_log!(EventType::GatewayComplete {
    operation: "converse".into(),
    success: reply.is_ok(),
  });

  state.with_shell(|shell| shell.finish_turn(&turn, reply));
}
