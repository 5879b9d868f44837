//! Timed, proctored exam for one chapter.
//!
//! ```text
//! Loading ──ok──▶ InProgress ──submit / timeout──▶ Submitted
//!    │  ▲              └──────focus lost─────────▶ Disqualified
//!   err │
//!    ▼  │retry
//! LoadFailed
//! ```
//!
//! Submitted and Disqualified are terminal: every mutation afterwards is
//! rejected with [`ExamError::Finished`]. The one exception is a timed-out
//! exam, which takes a single late set of answers for [`LATE_SUBMIT_GRACE`]
//! so the browser's own auto-submit still counts when the server got to zero first.

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::{Chapter, EncodedImage, ExamDocument, QuestionId, Subject, SubjectId};
use crate::error::{ExamError, ExamGenerationError};

/// How long after a timeout the final answer form is still accepted
pub const LATE_SUBMIT_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExamPhase {
  Loading,
  LoadFailed { reason: String },
  InProgress,
  Submitted,
  Disqualified,
}

impl ExamPhase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Loading => "loading",
      Self::LoadFailed { .. } => "load_failed",
      Self::InProgress => "in_progress",
      Self::Submitted => "submitted",
      Self::Disqualified => "disqualified",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Submitted | Self::Disqualified)
  }
}

/// How the exam ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamOutcome {
  Submitted,
  /// Countdown reached zero and the answers were submitted automatically
  TimedOut,
  /// Focus left the exam window; score forced to zero
  Disqualified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamResult {
  pub subject: SubjectId,
  pub chapter_title: String,
  pub outcome: ExamOutcome,
  pub score: u32,
  pub total_marks: u32,
  /// Free-text questions whose exact-match result a human should re-check
  pub needs_review: Vec<QuestionId>,
}

/// A request for the gateway, stamped so late results can be recognised
#[derive(Debug, Clone)]
pub struct ExamLoadRequest {
  pub ticket: LoadTicket,
  pub subject_name: String,
  pub chapter_title: String,
  pub images: Vec<EncodedImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
  pub session: u64,
  pub attempt: u32,
}

#[derive(Debug, Clone)]
pub struct ExamSession {
  generation: u64,
  attempt: u32,
  subject: SubjectId,
  subject_name: String,
  chapter_id: u32,
  chapter_title: String,
  images: Vec<EncodedImage>,
  phase: ExamPhase,
  document: Option<ExamDocument>,
  duration_secs: u32,
  remaining_secs: u32,
  answers: HashMap<QuestionId, String>,
  focus_lost: bool,
  result: Option<ExamResult>,
  timed_out_at: Option<Instant>,
  late_answers_taken: bool,
}

impl ExamSession {
  /// Start loading an exam. Fails if the chapter has no lesson images.
  pub fn begin(
    generation: u64,
    subject: &Subject,
    chapter: &Chapter,
    duration_secs: u32,
  ) -> Result<(Self, ExamLoadRequest), ExamError> {
    if !chapter.has_material() {
      return Err(ExamError::NoMaterial);
    }
    let session = Self {
      generation,
      attempt: 1,
      subject: subject.id,
      subject_name: subject.name.clone(),
      chapter_id: chapter.id,
      chapter_title: chapter.title.clone(),
      images: chapter.images.clone(),
      phase: ExamPhase::Loading,
      document: None,
      duration_secs,
      remaining_secs: duration_secs,
      answers: HashMap::new(),
      focus_lost: false,
      result: None,
      timed_out_at: None,
      late_answers_taken: false,
    };
    let request = session.load_request();
    Ok((session, request))
  }

  fn load_request(&self) -> ExamLoadRequest {
    ExamLoadRequest {
      ticket: LoadTicket {
        session: self.generation,
        attempt: self.attempt,
      },
      subject_name: self.subject_name.clone(),
      chapter_title: self.chapter_title.clone(),
      images: self.images.clone(),
    }
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn phase(&self) -> &ExamPhase {
    &self.phase
  }

  pub fn subject(&self) -> SubjectId {
    self.subject
  }

  pub fn subject_name(&self) -> &str {
    &self.subject_name
  }

  pub fn chapter_id(&self) -> u32 {
    self.chapter_id
  }

  pub fn chapter_title(&self) -> &str {
    &self.chapter_title
  }

  pub fn document(&self) -> Option<&ExamDocument> {
    self.document.as_ref()
  }

  pub fn remaining_secs(&self) -> u32 {
    self.remaining_secs
  }

  pub fn answer(&self, id: QuestionId) -> Option<&str> {
    self.answers.get(&id).map(String::as_str)
  }

  pub fn focus_lost(&self) -> bool {
    self.focus_lost
  }

  pub fn result(&self) -> Option<&ExamResult> {
    self.result.as_ref()
  }

  pub fn is_in_progress(&self) -> bool {
    self.phase == ExamPhase::InProgress
  }

  /// Apply the gateway's answer to a load request. Returns false if the
  /// ticket is stale (another attempt or another session).
  pub fn apply_load(
    &mut self,
    ticket: LoadTicket,
    loaded: Result<ExamDocument, ExamGenerationError>,
  ) -> bool {
    if ticket.session != self.generation
      || ticket.attempt != self.attempt
      || self.phase != ExamPhase::Loading
    {
      return false;
    }
    match loaded {
      Ok(document) => {
        tracing::info!(
          "Exam for {} - {} ready: {} questions, {} marks",
          self.subject_name,
          self.chapter_title,
          document.questions.len(),
          document.total_marks()
        );
        self.document = Some(document);
        self.remaining_secs = self.duration_secs;
        self.phase = ExamPhase::InProgress;
      }
      Err(e) => {
        tracing::warn!("Exam generation failed: {}", e);
        self.phase = ExamPhase::LoadFailed {
          reason: e.to_string(),
        };
      }
    }
    true
  }

  /// Leave `LoadFailed` and ask for a new exam
  pub fn retry(&mut self) -> Result<ExamLoadRequest, ExamError> {
    match self.phase {
      ExamPhase::LoadFailed { .. } => {
        self.attempt += 1;
        self.phase = ExamPhase::Loading;
        Ok(self.load_request())
      }
      ExamPhase::Submitted | ExamPhase::Disqualified => Err(ExamError::Finished),
      ExamPhase::Loading | ExamPhase::InProgress => Err(ExamError::NotInProgress),
    }
  }

  /// One second of countdown. Reaching zero submits automatically.
  pub fn tick(&mut self) -> Option<ExamResult> {
    if !self.is_in_progress() {
      return None;
    }
    self.remaining_secs = self.remaining_secs.saturating_sub(1);
    if self.remaining_secs == 0 {
      tracing::info!("Exam time is up, submitting automatically");
      self.timed_out_at = Some(Instant::now());
      return Some(self.finalize(ExamOutcome::TimedOut));
    }
    None
  }

  /// Proctoring signal: the exam window lost focus. Ignored unless in progress.
  pub fn lose_focus(&mut self) -> Option<ExamResult> {
    if !self.is_in_progress() {
      return None;
    }
    tracing::warn!(
      "Focus lost during {} exam, disqualifying",
      self.subject_name
    );
    self.focus_lost = true;
    Some(self.finalize(ExamOutcome::Disqualified))
  }

  /// Record (or overwrite) an answer. Values are not checked against the options.
  pub fn submit_answer(&mut self, id: QuestionId, value: impl Into<String>) -> Result<(), ExamError> {
    self.ensure_in_progress()?;
    let known = self.document.as_ref().is_some_and(|doc| doc.question(id).is_some());
    if !known {
      return Err(ExamError::UnknownQuestion(id));
    }
    self.answers.insert(id, value.into());
    Ok(())
  }

  pub fn submit(&mut self) -> Result<ExamResult, ExamError> {
    self.ensure_in_progress()?;
    Ok(self.finalize(ExamOutcome::Submitted))
  }

  /// Take the answer form that raced the countdown. Only after a timeout,
  /// only once and only within [`LATE_SUBMIT_GRACE`]; the outcome stays `TimedOut`.
  pub fn accept_late_answers(
    &mut self,
    answers: Vec<(QuestionId, String)>,
  ) -> Result<ExamResult, ExamError> {
    let in_grace = self
      .timed_out_at
      .is_some_and(|at| at.elapsed() <= LATE_SUBMIT_GRACE);
    if !in_grace || self.late_answers_taken {
      return Err(ExamError::Finished);
    }
    let document = self.document.as_ref().ok_or(ExamError::NotInProgress)?;
    if let Some((id, _)) = answers.iter().find(|(id, _)| document.question(*id).is_none()) {
      return Err(ExamError::UnknownQuestion(*id));
    }
    self.late_answers_taken = true;
    self.answers.extend(answers);
    tracing::info!("Late answers received within the grace window, rescoring");
    Ok(self.finalize(ExamOutcome::TimedOut))
  }

  fn ensure_in_progress(&self) -> Result<(), ExamError> {
    if self.phase.is_terminal() {
      return Err(ExamError::Finished);
    }
    if self.is_in_progress() {
      Ok(())
    } else {
      Err(ExamError::NotInProgress)
    }
  }

  /// Sum of marks for questions whose stored answer equals the key exactly
  pub fn score(&self) -> u32 {
    let Some(document) = &self.document else {
      return 0;
    };
    document
      .questions
      .iter()
      .filter(|q| self.answers.get(&q.id).is_some_and(|a| q.is_correct(a)))
      .fold(0u32, |score, q| score.saturating_add(q.marks))
  }

  fn finalize(&mut self, outcome: ExamOutcome) -> ExamResult {
    let (score, needs_review) = match outcome {
      ExamOutcome::Disqualified => (0, Vec::new()),
      ExamOutcome::Submitted | ExamOutcome::TimedOut => {
        let needs_review = self
          .document
          .iter()
          .flat_map(|doc| doc.questions.iter())
          .filter(|q| q.is_free_text())
          .filter(|q| self.answers.get(&q.id).is_some_and(|a| !a.trim().is_empty() && !q.is_correct(a)))
          .map(|q| q.id)
          .collect();
        (self.score(), needs_review)
      }
    };

    self.phase = match outcome {
      ExamOutcome::Disqualified => ExamPhase::Disqualified,
      ExamOutcome::Submitted | ExamOutcome::TimedOut => ExamPhase::Submitted,
    };

    let result = ExamResult {
      subject: self.subject,
      chapter_title: self.chapter_title.clone(),
      outcome,
      score,
      total_marks: self.document.as_ref().map_or(0, ExamDocument::total_marks),
      needs_review,
    };
    self.result = Some(result.clone());
    result
  }
}
