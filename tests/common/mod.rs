//! Shared harness for the HTTP flow tests: a scripted AI teacher, a fixed
//! clock and a test server wrapped around the real router.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;

use shwe_g12::domain::{ClockTime, EncodedImage, ExamDocument, Question};
use shwe_g12::error::{ExamGenerationError, GatewayError};
use shwe_g12::gateway::TeacherGateway;
use shwe_g12::handlers;
use shwe_g12::scheduler::FixedClock;
use shwe_g12::state::{AppState, Settings};

pub const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub fn png_bytes() -> Vec<u8> {
  let mut bytes = PNG_HEADER.to_vec();
  bytes.extend_from_slice(b"lesson page");
  bytes
}

pub fn t(s: &str) -> ClockTime {
  ClockTime::parse(s).unwrap()
}

/// Two questions: a 3-mark choice (answer "B") and a 2-mark free-text one (answer "Paris")
pub fn exam_document() -> ExamDocument {
  ExamDocument {
    questions: vec![
      Question {
        id: 1,
        prompt: "Which option is correct?".into(),
        options: Some(vec!["A".into(), "B".into(), "C".into()]),
        correct_answer: "B".into(),
        marks: 3,
      },
      Question {
        id: 2,
        prompt: "Name the capital of France".into(),
        options: None,
        correct_answer: "Paris".into(),
        marks: 2,
      },
    ],
  }
}

/// Gateway double that counts calls and fails on request
#[derive(Default)]
pub struct ScriptedGateway {
  converse_calls: AtomicUsize,
  exam_calls: AtomicUsize,
  exam_failures: AtomicUsize,
}

impl ScriptedGateway {
  pub fn converse_calls(&self) -> usize {
    self.converse_calls.load(Ordering::SeqCst)
  }

  pub fn exam_calls(&self) -> usize {
    self.exam_calls.load(Ordering::SeqCst)
  }

  /// Make the next `count` exam requests come back malformed
  pub fn fail_next_exams(&self, count: usize) {
    self.exam_failures.store(count, Ordering::SeqCst);
  }
}

#[async_trait]
impl TeacherGateway for ScriptedGateway {
  async fn converse(
    &self,
    prompt: &str,
    images: &[EncodedImage],
    _context: &str,
  ) -> Result<String, GatewayError> {
    self.converse_calls.fetch_add(1, Ordering::SeqCst);
    if images.is_empty() {
      return Err(GatewayError::EmptyResponse);
    }
    Ok(format!("Teacher reply to: {}", prompt))
  }

  async fn generate_exam(
    &self,
    _subject_name: &str,
    _chapter_title: &str,
    _images: &[EncodedImage],
  ) -> Result<ExamDocument, ExamGenerationError> {
    self.exam_calls.fetch_add(1, Ordering::SeqCst);
    let failing = self
      .exam_failures
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if failing {
      return Err(ExamGenerationError::Malformed("truncated JSON".into()));
    }
    Ok(exam_document())
  }
}

pub struct Harness {
  pub server: TestServer,
  pub state: AppState,
  pub gateway: Arc<ScriptedGateway>,
  pub clock: Arc<FixedClock>,
}

pub fn harness() -> Harness {
  harness_with_exam_secs(1200)
}

pub fn harness_with_exam_secs(exam_duration_secs: u32) -> Harness {
  let gateway = Arc::new(ScriptedGateway::default());
  let clock = Arc::new(FixedClock::new(t("08:00")));
  let state = AppState::new(
    gateway.clone(),
    clock.clone(),
    Settings {
      scheduler_tick: Duration::from_secs(60),
      exam_tick: Duration::from_secs(1),
      exam_duration_secs,
    },
  );
  let server = TestServer::new(handlers::router(state.clone())).unwrap();
  Harness {
    server,
    state,
    gateway,
    clock,
  }
}

/// Multipart body with one `images` part per file
pub fn upload_form(files: &[(&str, Vec<u8>)]) -> MultipartForm {
  files
    .iter()
    .fold(MultipartForm::new(), |form, (name, bytes)| {
      form.add_part(
        "images",
        Part::bytes(bytes.clone())
          .file_name(name.to_string())
          .mime_type("application/octet-stream"),
      )
    })
}

impl Harness {
  /// Open the classroom for a subject, as clicking it in the sidebar does
  pub async fn open_subject(&self, id: &str) {
    let response = self.server.post(&format!("/subject/{}", id)).await;
    assert_eq!(response.header("location"), "/classroom");
  }

  pub async fn upload_pages(&self, count: usize) {
    let files: Vec<(String, Vec<u8>)> = (0..count).map(|i| (format!("page{}.png", i), png_bytes())).collect();
    let files: Vec<(&str, Vec<u8>)> = files.iter().map(|(n, b)| (n.as_str(), b.clone())).collect();
    self
      .server
      .post("/classroom/upload")
      .multipart(upload_form(&files))
      .await;
  }

  pub fn image_count(&self) -> usize {
    self
      .state
      .read_shell(|shell| shell.current_chapter().map_or(0, |c| c.image_count()))
  }

  pub fn exam_phase(&self) -> Option<&'static str> {
    self
      .state
      .read_shell(|shell| shell.exam().map(|e| e.phase().as_str()))
  }

  /// Poll until the background exam load lands in `phase`
  pub async fn wait_for_exam(&self, phase: &str) {
    for _ in 0..100 {
      if self.exam_phase() == Some(phase) {
        return;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("exam never reached {} (now {:?})", phase, self.exam_phase());
  }
}
