//! Classroom session: the chat between the student and the teacher for one chapter.
//!
//! The session never calls the gateway itself. A turn is split in two so the
//! caller can release the shell lock while the teacher is thinking:
//! [`ClassroomSession::begin_turn`] validates the message, appends it and
//! hands back a [`PendingTurn`]; [`ClassroomSession::finish_turn`] appends the
//! reply (or the apology) if the turn still belongs to this session.

use crate::domain::{Chapter, EncodedImage, Message, Subject, SubjectId};
use crate::error::{ClassroomError, GatewayError};
use crate::gateway::prompts::{self, APOLOGY_REPLY};

/// Where the chapter is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassroomPhase {
  /// No lesson images yet; the only thing to do is upload
  NoImages,
  /// Material is available but nothing has been asked in this session
  HasImages,
  /// At least one message has been sent in this session
  Conversing,
}

/// Everything needed to ask the gateway, detached from the shell
#[derive(Debug, Clone)]
pub struct PendingTurn {
  pub session: u64,
  pub turn: u64,
  pub prompt: String,
  pub images: Vec<EncodedImage>,
  pub context: String,
}

/// Identifies the session an upload was started for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket {
  pub session: u64,
}

#[derive(Debug, Clone)]
pub struct ClassroomSession {
  generation: u64,
  subject: SubjectId,
  chapter_id: u32,
  phase: ClassroomPhase,
  transcript: Vec<Message>,
  in_flight: Option<u64>,
  turns_started: u64,
}

impl ClassroomSession {
  /// Bind a fresh session to a chapter. A chapter that already has images
  /// starts in `HasImages`, so the opening prompt is never sent twice.
  pub fn new(generation: u64, subject: SubjectId, chapter: &Chapter) -> Self {
    Self {
      generation,
      subject,
      chapter_id: chapter.id,
      phase: if chapter.has_material() {
        ClassroomPhase::HasImages
      } else {
        ClassroomPhase::NoImages
      },
      transcript: Vec::new(),
      in_flight: None,
      turns_started: 0,
    }
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn subject(&self) -> SubjectId {
    self.subject
  }

  pub fn chapter_id(&self) -> u32 {
    self.chapter_id
  }

  pub fn phase(&self) -> ClassroomPhase {
    self.phase
  }

  pub fn transcript(&self) -> &[Message] {
    &self.transcript
  }

  /// True while a gateway call is outstanding
  pub fn is_busy(&self) -> bool {
    self.in_flight.is_some()
  }

  pub fn is_bound_to(&self, subject: SubjectId, chapter_id: u32) -> bool {
    self.subject == subject && self.chapter_id == chapter_id
  }

  pub fn upload_ticket(&self) -> UploadTicket {
    UploadTicket {
      session: self.generation,
    }
  }

  /// Record that a batch was appended to the chapter. Returns true when this
  /// was the chapter's first material, i.e. the opening prompt should be sent.
  pub fn record_upload(&mut self, previous_count: usize) -> bool {
    if self.phase == ClassroomPhase::NoImages {
      self.phase = ClassroomPhase::HasImages;
    }
    previous_count == 0
  }

  /// Validate and append a student message, reserving the single in-flight slot.
  pub fn begin_turn(
    &mut self,
    text: &str,
    subject: &Subject,
    chapter: &Chapter,
  ) -> Result<PendingTurn, ClassroomError> {
    let text = text.trim();
    if text.is_empty() {
      return Err(ClassroomError::EmptyMessage);
    }
    if !chapter.has_material() {
      return Err(ClassroomError::NoMaterial);
    }
    if self.in_flight.is_some() {
      return Err(ClassroomError::Busy);
    }

    self.turns_started += 1;
    self.in_flight = Some(self.turns_started);
    self.transcript.push(Message::user(text));
    self.phase = ClassroomPhase::Conversing;

    Ok(PendingTurn {
      session: self.generation,
      turn: self.turns_started,
      prompt: text.to_string(),
      images: chapter.images.clone(),
      context: prompts::classroom_context(subject, chapter),
    })
  }

  /// Append the teacher's reply. Gateway failures become the apology line so
  /// the student is never left without an answer. Returns false (and changes
  /// nothing) if the turn belongs to another session or was already finished.
  pub fn finish_turn(&mut self, turn: &PendingTurn, reply: Result<String, GatewayError>) -> bool {
    if turn.session != self.generation || self.in_flight != Some(turn.turn) {
      return false;
    }
    self.in_flight = None;

    let text = match reply {
      Ok(text) => text,
      Err(e) => {
        tracing::warn!("Teacher gateway failed, replying with apology: {}", e);
        APOLOGY_REPLY.to_string()
      }
    };
    self.transcript.push(Message::model(text));
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::image::{decode_batch, fixtures};
  use crate::domain::subject::catalog;
  use crate::domain::Role;

  fn subject_with_images(count: usize) -> Subject {
    let mut subject = catalog().remove(0);
    let uploads: Vec<_> = (0..count).map(|i| fixtures::png(&format!("p{}.png", i))).collect();
    subject.chapters[0].images = decode_batch(&uploads).unwrap();
    subject
  }

  #[test]
  fn test_new_session_phase_follows_material() {
    let empty = subject_with_images(0);
    let session = ClassroomSession::new(1, empty.id, &empty.chapters[0]);
    assert_eq!(session.phase(), ClassroomPhase::NoImages);

    let stocked = subject_with_images(2);
    let session = ClassroomSession::new(2, stocked.id, &stocked.chapters[0]);
    assert_eq!(session.phase(), ClassroomPhase::HasImages);
  }

  #[test]
  fn test_blank_message_rejected_without_side_effects() {
    let subject = subject_with_images(1);
    let mut session = ClassroomSession::new(1, subject.id, &subject.chapters[0]);
    let err = session.begin_turn("   \n", &subject, &subject.chapters[0]).unwrap_err();
    assert_eq!(err, ClassroomError::EmptyMessage);
    assert!(session.transcript().is_empty());
    assert!(!session.is_busy());
  }

  #[test]
  fn test_no_material_rejected_without_side_effects() {
    let subject = subject_with_images(0);
    let mut session = ClassroomSession::new(1, subject.id, &subject.chapters[0]);
    let err = session.begin_turn("What is this?", &subject, &subject.chapters[0]).unwrap_err();
    assert_eq!(err, ClassroomError::NoMaterial);
    assert!(session.transcript().is_empty());
    assert_eq!(session.phase(), ClassroomPhase::NoImages);
  }

  #[test]
  fn test_turn_round_trip() {
    let subject = subject_with_images(2);
    let chapter = &subject.chapters[0];
    let mut session = ClassroomSession::new(1, subject.id, chapter);

    let turn = session.begin_turn("Explain page 1", &subject, chapter).unwrap();
    assert_eq!(turn.images.len(), 2);
    assert_eq!(turn.context, "Teaching Myanmar - Chapter 1. Images uploaded: 2");
    assert!(session.is_busy());
    assert_eq!(session.phase(), ClassroomPhase::Conversing);

    assert!(session.finish_turn(&turn, Ok("Here is page 1".into())));
    assert!(!session.is_busy());
    let roles: Vec<Role> = session.transcript().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Model]);
  }

  #[test]
  fn test_gateway_failure_becomes_apology() {
    let subject = subject_with_images(1);
    let chapter = &subject.chapters[0];
    let mut session = ClassroomSession::new(1, subject.id, chapter);

    let turn = session.begin_turn("Hi", &subject, chapter).unwrap();
    assert!(session.finish_turn(&turn, Err(GatewayError::Timeout)));
    assert_eq!(session.transcript()[1].text, APOLOGY_REPLY);
  }

  #[test]
  fn test_second_send_while_busy_is_rejected() {
    let subject = subject_with_images(1);
    let chapter = &subject.chapters[0];
    let mut session = ClassroomSession::new(1, subject.id, chapter);

    let _turn = session.begin_turn("First", &subject, chapter).unwrap();
    let err = session.begin_turn("Second", &subject, chapter).unwrap_err();
    assert_eq!(err, ClassroomError::Busy);
    assert_eq!(session.transcript().len(), 1);
  }

  #[test]
  fn test_stale_turn_is_dropped() {
    let subject = subject_with_images(1);
    let chapter = &subject.chapters[0];
    let mut old = ClassroomSession::new(1, subject.id, chapter);
    let turn = old.begin_turn("Hi", &subject, chapter).unwrap();

    let mut fresh = ClassroomSession::new(2, subject.id, chapter);
    assert!(!fresh.finish_turn(&turn, Ok("late reply".into())));
    assert!(fresh.transcript().is_empty());
  }

  #[test]
  fn test_turn_cannot_finish_twice() {
    let subject = subject_with_images(1);
    let chapter = &subject.chapters[0];
    let mut session = ClassroomSession::new(1, subject.id, chapter);
    let turn = session.begin_turn("Hi", &subject, chapter).unwrap();
    assert!(session.finish_turn(&turn, Ok("one".into())));
    assert!(!session.finish_turn(&turn, Ok("two".into())));
    assert_eq!(session.transcript().len(), 2);
  }

  #[test]
  fn test_record_upload_gate() {
    let subject = subject_with_images(0);
    let mut session = ClassroomSession::new(1, subject.id, &subject.chapters[0]);
    assert!(session.record_upload(0));
    assert_eq!(session.phase(), ClassroomPhase::HasImages);
    assert!(!session.record_upload(3));
  }
}
