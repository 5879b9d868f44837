//! Exam generation runs in the background while the exam page shows a
//! loading state.

use tokio::task::JoinHandle;

use crate::error::TutorError;
use crate::exam::ExamLoadRequest;
#[cfg(feature = "profiling")]
use crate::profiling::EventType;
use crate::state::AppState;

/// Start an exam on the current chapter. Returns the handle of the load task,
/// or `None` if an exam is already loading or running.
pub fn start_exam(state: &AppState) -> Result<Option<JoinHandle<()>>, TutorError> {
  let request = state.with_shell(|shell| shell.start_exam())?;
  Ok(request.map(|request| spawn_load(state, request)))
}

/// Ask for a new exam after a failed load
pub fn retry_exam(state: &AppState) -> Result<JoinHandle<()>, TutorError> {
  let request = state.with_shell(|shell| shell.retry_exam())?;
  Ok(spawn_load(state, request))
}

fn spawn_load(state: &AppState, request: ExamLoadRequest) -> JoinHandle<()> {
  let state = state.clone();
  tokio::spawn(async move {
    #[cfg(feature = "profiling")]
    crate::profile_log!(EventType::GatewayCall {
      operation: "generate_exam".into(),
      images: request.images.len(),
    });

    let loaded = state
      .gateway
      .generate_exam(&request.subject_name, &request.chapter_title, &request.images)
      .await;

    #[cfg(feature = "profiling")]
    crate::profile_log!(
      EventType::GatewayComplete {
        operation: "generate_exam".into(),
        success: loaded.is_ok(),
      },
      serde_json::json!({ "attempt": request.ticket.attempt })
    );

    state.with_shell(|shell| shell.apply_exam_load(request.ticket, loaded));
  })
}
