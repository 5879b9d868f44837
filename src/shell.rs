//! The application shell: single owner of navigation and study state.
//!
//! Views never mutate [`AppShell`] fields directly. They either dispatch an
//! [`Action`] or call one of the session entry points below, which validate
//! first and only then change state. Nothing here awaits; gateway calls are
//! made by the caller between a `begin_*` and the matching `finish_*`/`apply_*`.

use crate::classroom::{ClassroomSession, PendingTurn, UploadTicket};
use crate::domain::subject::catalog;
use crate::domain::timetable::TimetableEntry;
use crate::domain::{
  Chapter, ClockTime, EncodedImage, ExamDocument, QuestionId, Subject, SubjectId, TimetableState,
};
use crate::error::{
  ClassroomError, ExamError, ExamGenerationError, GatewayError, LogOnError, TutorError,
};
use crate::exam::{ExamLoadRequest, ExamOutcome, ExamResult, ExamSession, LoadTicket};
use crate::gateway::prompts::OPENING_PROMPT;
#[cfg(feature = "profiling")]
use crate::profiling::EventType;

/// Top-level screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
  Dashboard,
  Classroom,
  Timetable,
  Exam,
}

impl View {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Dashboard => "dashboard",
      Self::Classroom => "classroom",
      Self::Timetable => "timetable",
      Self::Exam => "exam",
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "dashboard" => Some(Self::Dashboard),
      "classroom" => Some(Self::Classroom),
      "timetable" => Some(Self::Timetable),
      "exam" => Some(Self::Exam),
      _ => None,
    }
  }

  /// Where the browser should land to see this view
  pub fn path(&self) -> &'static str {
    match self {
      Self::Dashboard => "/",
      Self::Classroom => "/classroom",
      Self::Timetable => "/timetable",
      Self::Exam => "/exam",
    }
  }
}

/// State changes the views may request
#[derive(Debug, Clone)]
pub enum Action {
  SelectSubject(SubjectId),
  /// Pick a chapter within the current subject
  SelectChapter(u32),
  SelectView(View),
  /// Replace the chapter with the same id in the current subject
  UpdateChapter(Chapter),
  ToggleChapterCompleted(u32),
  LockTimetable(Vec<TimetableEntry>),
  /// Wall-clock reading from the scheduler
  ClockTick(ClockTime),
  FinishExam(ExamResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
  Info,
  Success,
  Error,
}

impl NoticeLevel {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Info => "info",
      Self::Success => "success",
      Self::Error => "error",
    }
  }
}

/// A one-shot message shown on the next rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub level: NoticeLevel,
  pub text: String,
}

pub struct AppShell {
  view: View,
  current_subject: SubjectId,
  current_chapter: u32,
  subjects: Vec<Subject>,
  timetable: TimetableState,
  classroom: Option<ClassroomSession>,
  exam: Option<ExamSession>,
  last_exam: Option<ExamResult>,
  notifications: Vec<Notification>,
  generation: u64,
  exam_duration_secs: u32,
}

/// Resolve a (subject, chapter) pair against the catalog
fn locate(
  subjects: &[Subject],
  subject_id: SubjectId,
  chapter_id: u32,
) -> Result<(&Subject, &Chapter), TutorError> {
  let subject = subjects
    .iter()
    .find(|s| s.id == subject_id)
    .ok_or_else(|| TutorError::NotFound {
      kind: "subject",
      value: subject_id.to_string(),
    })?;
  let chapter = subject.chapter(chapter_id).ok_or_else(|| TutorError::NotFound {
    kind: "chapter",
    value: chapter_id.to_string(),
  })?;
  Ok((subject, chapter))
}

impl AppShell {
  pub fn new(exam_duration_secs: u32) -> Self {
    let subjects = catalog();
    let current_subject = subjects.first().map_or(SubjectId::Myanmar, |s| s.id);
    let current_chapter = subjects
      .first()
      .and_then(Subject::first_chapter)
      .map_or(1, |c| c.id);

    Self {
      view: View::Dashboard,
      current_subject,
      current_chapter,
      subjects,
      timetable: TimetableState::default(),
      classroom: None,
      exam: None,
      last_exam: None,
      notifications: Vec::new(),
      generation: 0,
      exam_duration_secs,
    }
  }

  // ==================== Read access ====================

  pub fn view(&self) -> View {
    self.view
  }

  pub fn subjects(&self) -> &[Subject] {
    &self.subjects
  }

  pub fn current_subject_id(&self) -> SubjectId {
    self.current_subject
  }

  pub fn current_chapter_id(&self) -> u32 {
    self.current_chapter
  }

  pub fn current_subject(&self) -> Result<&Subject, TutorError> {
    locate(&self.subjects, self.current_subject, self.current_chapter).map(|(s, _)| s)
  }

  pub fn current_chapter(&self) -> Result<&Chapter, TutorError> {
    locate(&self.subjects, self.current_subject, self.current_chapter).map(|(_, c)| c)
  }

  pub fn subject(&self, id: SubjectId) -> Option<&Subject> {
    self.subjects.iter().find(|s| s.id == id)
  }

  pub fn timetable(&self) -> &TimetableState {
    &self.timetable
  }

  /// The live classroom session, if one has been opened for the current chapter
  pub fn classroom(&self) -> Option<&ClassroomSession> {
    self
      .classroom
      .as_ref()
      .filter(|s| s.is_bound_to(self.current_subject, self.current_chapter))
  }

  pub fn exam(&self) -> Option<&ExamSession> {
    self.exam.as_ref()
  }

  pub fn last_exam(&self) -> Option<&ExamResult> {
    self.last_exam.as_ref()
  }

  pub fn exam_running(&self) -> bool {
    self.exam.as_ref().is_some_and(ExamSession::is_in_progress)
  }

  pub fn notifications(&self) -> &[Notification] {
    &self.notifications
  }

  /// Drain pending notifications (they are shown once)
  pub fn take_notifications(&mut self) -> Vec<Notification> {
    std::mem::take(&mut self.notifications)
  }

  pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
    self.notifications.push(Notification {
      level,
      text: text.into(),
    });
  }

  fn next_generation(&mut self) -> u64 {
    self.generation += 1;
    self.generation
  }

  // ==================== Reducer ====================

  pub fn dispatch(&mut self, action: Action) -> Result<(), TutorError> {
    match action {
      Action::SelectSubject(id) => {
        self.abandon_running_exam();
        self.switch_subject(id)?;
      }
      Action::SelectChapter(chapter_id) => {
        let subject = self.current_subject()?;
        if subject.chapter(chapter_id).is_none() {
          return Err(TutorError::NotFound {
            kind: "chapter",
            value: chapter_id.to_string(),
          });
        }
        if chapter_id != self.current_chapter {
          self.current_chapter = chapter_id;
          self.classroom = None;
        }
      }
      Action::SelectView(view) => {
        if view != View::Exam {
          self.abandon_running_exam();
        }
        self.view = view;
      }
      Action::UpdateChapter(chapter) => {
        let current = self.current_subject;
        let replaced = self
          .subjects
          .iter_mut()
          .find(|s| s.id == current)
          .is_some_and(|s| s.replace_chapter(chapter));
        if !replaced {
          tracing::debug!("UpdateChapter ignored: no matching chapter in {}", current);
        }
      }
      Action::ToggleChapterCompleted(chapter_id) => {
        let current = self.current_subject;
        let chapter = self
          .subjects
          .iter_mut()
          .find(|s| s.id == current)
          .and_then(|s| s.chapters.iter_mut().find(|c| c.id == chapter_id))
          .ok_or_else(|| TutorError::NotFound {
            kind: "chapter",
            value: chapter_id.to_string(),
          })?;
        chapter.completed = !chapter.completed;
      }
      Action::LockTimetable(entries) => {
        self.timetable.lock(entries)?;
        let slots = self.timetable.timetable().map_or(0, |t| t.entries().len());
        tracing::info!("Timetable locked with {} slots", slots);
        self.view = View::Dashboard;
        self.notify(NoticeLevel::Success, "Timetable fixed for today. Stick to it!");
      }
      Action::ClockTick(now) => self.on_clock_tick(now)?,
      Action::FinishExam(result) => {
        let notice = finish_notice(&result);
        tracing::info!(
          "Exam finished ({:?}) for {} - {}: {}/{}",
          result.outcome,
          result.subject,
          result.chapter_title,
          result.score,
          result.total_marks
        );
        self.notifications.push(notice);
        self.last_exam = Some(result);
        self.view = View::Dashboard;
      }
    }
    Ok(())
  }

  fn switch_subject(&mut self, id: SubjectId) -> Result<(), TutorError> {
    if id == self.current_subject {
      return Ok(());
    }
    let subject = self.subject(id).ok_or_else(|| TutorError::NotFound {
      kind: "subject",
      value: id.to_string(),
    })?;
    let chapter_id = subject.first_chapter().map_or(1, |c| c.id);

    #[cfg(feature = "profiling")]
    crate::profile_log!(EventType::SubjectSwitch {
      from: self.current_subject.to_string(),
      to: id.to_string(),
    });

    tracing::debug!("Switching subject {} -> {}", self.current_subject, id);
    self.current_subject = id;
    self.current_chapter = chapter_id;
    if let Some(session) = self.classroom.take() {
      tracing::debug!(
        "Discarding classroom session {} ({} messages)",
        session.generation(),
        session.transcript().len()
      );
    }
    Ok(())
  }

  fn on_clock_tick(&mut self, now: ClockTime) -> Result<(), TutorError> {
    let Some(timetable) = self.timetable.timetable() else {
      return Ok(());
    };
    let Some(slot) = timetable.current_slot(now) else {
      return Ok(());
    };
    let subject = slot.subject;
    if subject == self.current_subject {
      return Ok(());
    }
    if self.exam_running() {
      tracing::debug!("Deferring switch to {} until the exam ends", subject);
      return Ok(());
    }

    self.switch_subject(subject)?;
    self.view = View::Classroom;
    let name = self.current_subject()?.name.to_uppercase();
    tracing::info!("Timetable switched to {} at {}", name, now);
    self.notify(NoticeLevel::Info, format!("Time to study {}!", name));
    Ok(())
  }

  /// Navigating away from a running exam counts as leaving the exam screen
  fn abandon_running_exam(&mut self) {
    if self.exam_running() {
      tracing::warn!("Navigation away from a running exam");
      self.exam_focus_lost();
    }
  }

  // ==================== Classroom ====================

  /// Current chapter's session, created on first use
  fn classroom_parts(&mut self) -> Result<(&mut ClassroomSession, &Subject, &Chapter), TutorError> {
    let subject_id = self.current_subject;
    let chapter_id = self.current_chapter;
    let (subject, chapter) = locate(&self.subjects, subject_id, chapter_id)?;

    if self
      .classroom
      .as_ref()
      .is_some_and(|s| !s.is_bound_to(subject_id, chapter_id))
    {
      self.classroom = None;
    }
    let generation = &mut self.generation;
    let session = self.classroom.get_or_insert_with(|| {
      *generation += 1;
      tracing::debug!("Opening classroom session {} for {} chapter {}", generation, subject_id, chapter_id);
      ClassroomSession::new(*generation, subject_id, chapter)
    });
    Ok((session, subject, chapter))
  }

  pub fn open_classroom(&mut self) -> Result<&ClassroomSession, TutorError> {
    self.classroom_parts().map(|(session, _, _)| &*session)
  }

  pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn, TutorError> {
    let (session, subject, chapter) = self.classroom_parts()?;
    Ok(session.begin_turn(text, subject, chapter)?)
  }

  pub fn finish_turn(&mut self, turn: &PendingTurn, reply: Result<String, GatewayError>) -> bool {
    let applied = self
      .classroom
      .as_mut()
      .is_some_and(|s| s.finish_turn(turn, reply));
    if !applied {
      tracing::debug!(
        "Dropping reply for stale classroom turn {}/{}",
        turn.session,
        turn.turn
      );
    }
    applied
  }

  pub fn upload_ticket(&mut self) -> Result<UploadTicket, TutorError> {
    self.classroom_parts().map(|(session, _, _)| session.upload_ticket())
  }

  /// Append a fully decoded batch to the current chapter in one step.
  ///
  /// Returns the opening turn to send when this was the chapter's first material.
  pub fn commit_upload(
    &mut self,
    ticket: UploadTicket,
    images: Vec<EncodedImage>,
  ) -> Result<Option<PendingTurn>, TutorError> {
    if images.is_empty() {
      return Ok(None);
    }
    if self.classroom().map(ClassroomSession::generation) != Some(ticket.session) {
      return Err(ClassroomError::Superseded.into());
    }

    let mut chapter = self.current_chapter()?.clone();
    let previous = chapter.image_count();
    let added = images.len();
    chapter.images.extend(images);
    self.dispatch(Action::UpdateChapter(chapter))?;
    tracing::info!(
      "Added {} lesson images to {} chapter {} ({} total)",
      added,
      self.current_subject,
      self.current_chapter,
      previous + added
    );

    let first_material = self
      .classroom
      .as_mut()
      .is_some_and(|s| s.record_upload(previous));
    if !first_material {
      return Ok(None);
    }
    Ok(self.begin_turn(OPENING_PROMPT).log_warn("Opening lesson prompt not sent"))
  }

  // ==================== Exam ====================

  /// Start an exam for the current chapter. `None` means one is already underway.
  pub fn start_exam(&mut self) -> Result<Option<ExamLoadRequest>, TutorError> {
    if let Some(exam) = &self.exam
      && matches!(exam.phase(), crate::exam::ExamPhase::Loading | crate::exam::ExamPhase::InProgress)
    {
      self.view = View::Exam;
      return Ok(None);
    }

    let generation = self.generation + 1;
    let (subject, chapter) = locate(&self.subjects, self.current_subject, self.current_chapter)?;
    let (session, request) = ExamSession::begin(generation, subject, chapter, self.exam_duration_secs)?;
    self.generation = generation;

    tracing::info!("Starting exam for {} - {}", session.subject_name(), session.chapter_title());
    #[cfg(feature = "profiling")]
    crate::profile_log!(EventType::ExamTransition {
      phase: session.phase().as_str().into(),
    });

    self.exam = Some(session);
    self.view = View::Exam;
    Ok(Some(request))
  }

  pub fn retry_exam(&mut self) -> Result<ExamLoadRequest, TutorError> {
    let exam = self.exam.as_mut().ok_or(ExamError::NoExam)?;
    let request = exam.retry()?;
    tracing::info!("Retrying exam generation (attempt {})", request.ticket.attempt);
    self.view = View::Exam;
    Ok(request)
  }

  pub fn apply_exam_load(
    &mut self,
    ticket: LoadTicket,
    loaded: Result<ExamDocument, ExamGenerationError>,
  ) -> bool {
    let applied = self
      .exam
      .as_mut()
      .is_some_and(|exam| exam.apply_load(ticket, loaded));
    if !applied {
      tracing::debug!(
        "Dropping stale exam load {}/{}",
        ticket.session,
        ticket.attempt
      );
      return false;
    }

    #[cfg(feature = "profiling")]
    if let Some(exam) = &self.exam {
      crate::profile_log!(EventType::ExamTransition {
        phase: exam.phase().as_str().into(),
      });
    }

    if let Some(exam) = &self.exam
      && let crate::exam::ExamPhase::LoadFailed { .. } = exam.phase()
    {
      self.notify(NoticeLevel::Error, "Could not prepare the exam. Please try again.");
    }
    true
  }

  /// One second of exam countdown
  pub fn exam_tick(&mut self) -> Result<(), TutorError> {
    let finished = self.exam.as_mut().and_then(ExamSession::tick);
    match finished {
      Some(result) => self.dispatch(Action::FinishExam(result)),
      None => Ok(()),
    }
  }

  /// Proctoring signal from the browser. Ignored unless an exam is running.
  pub fn exam_focus_lost(&mut self) {
    if let Some(result) = self.exam.as_mut().and_then(ExamSession::lose_focus) {
      #[cfg(feature = "profiling")]
      crate::profile_log!(EventType::ExamTransition {
        phase: "disqualified".into(),
      });
      self.dispatch(Action::FinishExam(result)).log_warn("Failed to finish exam");
    }
  }

  pub fn submit_exam_answer(&mut self, id: QuestionId, value: String) -> Result<(), TutorError> {
    let exam = self.exam.as_mut().ok_or(ExamError::NoExam)?;
    exam.submit_answer(id, value)?;
    Ok(())
  }

  pub fn submit_exam(&mut self) -> Result<ExamResult, TutorError> {
    let exam = self.exam.as_mut().ok_or(ExamError::NoExam)?;
    let result = exam.submit()?;
    self.dispatch(Action::FinishExam(result.clone()))?;
    Ok(result)
  }

  /// The exam page's answer form. A running exam records the answers and is
  /// submitted; a form arriving just after the countdown ran out replaces the
  /// auto-submitted result.
  pub fn submit_exam_form(
    &mut self,
    answers: Vec<(QuestionId, String)>,
  ) -> Result<ExamResult, TutorError> {
    let exam = self.exam.as_mut().ok_or(ExamError::NoExam)?;
    if exam.is_in_progress() {
      for (id, value) in answers {
        exam.submit_answer(id, value)?;
      }
      return self.submit_exam();
    }

    let result = exam.accept_late_answers(answers)?;
    if let Some(stale) = self.last_exam.as_ref().map(finish_notice) {
      self.notifications.retain(|n| *n != stale);
    }
    self.dispatch(Action::FinishExam(result.clone()))?;
    Ok(result)
  }
}

fn finish_notice(result: &ExamResult) -> Notification {
  match result.outcome {
    ExamOutcome::Submitted => Notification {
      level: NoticeLevel::Success,
      text: format!("Exam submitted! Score: {}/{}", result.score, result.total_marks),
    },
    ExamOutcome::TimedOut => Notification {
      level: NoticeLevel::Success,
      text: format!(
        "Time is up! Your answers were submitted. Score: {}/{}",
        result.score, result.total_marks
      ),
    },
    ExamOutcome::Disqualified => Notification {
      level: NoticeLevel::Error,
      text: "Disqualified: you left the exam screen. Score: 0".to_string(),
    },
  }
}
