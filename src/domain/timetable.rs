//! Daily study timetable: time-boxed subject slots and the lock transition.
//!
//! Times are wall-clock minutes within a single day. Slot matching is
//! inclusive at both ends, and when several slots contain the same minute
//! the first one in sequence order wins. Slots that genuinely overlap are
//! rejected when the timetable is locked; slots that merely touch (one ends
//! at the minute the next begins) are allowed and resolved by sequence order.

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use super::subject::SubjectId;
use crate::error::TimetableError;

/// A wall-clock time of day with minute resolution ("HH:MM").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
  hour: u8,
  minute: u8,
}

impl ClockTime {
  pub fn new(hour: u8, minute: u8) -> Option<Self> {
    (hour < 24 && minute < 60).then_some(Self { hour, minute })
  }

  /// Parse a strict "HH:MM" string (24-hour clock, two digits each)
  pub fn parse(s: &str) -> Result<Self, TimetableError> {
    let invalid = || TimetableError::InvalidTime(s.to_string());
    let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(h) || !two_digits(m) {
      return Err(invalid());
    }
    let hour = h.parse::<u8>().map_err(|_| invalid())?;
    let minute = m.parse::<u8>().map_err(|_| invalid())?;
    Self::new(hour, minute).ok_or_else(invalid)
  }

  /// Truncate any chrono time (e.g. `Local::now()`) to the minute
  pub fn from_time<T: Timelike>(t: &T) -> Self {
    Self {
      hour: t.hour() as u8,
      minute: t.minute() as u8,
    }
  }

  pub fn minutes_since_midnight(&self) -> u32 {
    self.hour as u32 * 60 + self.minute as u32
  }
}

impl std::fmt::Display for ClockTime {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:02}:{:02}", self.hour, self.minute)
  }
}

impl TryFrom<String> for ClockTime {
  type Error = TimetableError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<ClockTime> for String {
  fn from(value: ClockTime) -> Self {
    value.to_string()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
  pub subject: SubjectId,
  pub start: ClockTime,
  pub end: ClockTime,
  /// Informational only; normalized to `end - start` when the timetable is locked
  pub duration_minutes: u32,
}

impl TimetableEntry {
  pub fn new(subject: SubjectId, start: ClockTime, end: ClockTime) -> Self {
    Self {
      subject,
      start,
      end,
      duration_minutes: end
        .minutes_since_midnight()
        .saturating_sub(start.minutes_since_midnight()),
    }
  }

  /// Inclusive of both endpoints
  pub fn contains(&self, now: ClockTime) -> bool {
    self.start <= now && now <= self.end
  }

  pub fn derived_duration(&self) -> u32 {
    self
      .end
      .minutes_since_midnight()
      .saturating_sub(self.start.minutes_since_midnight())
  }

  fn overlaps(&self, other: &TimetableEntry) -> bool {
    self.start < other.end && other.start < self.end
  }

  fn label(&self) -> String {
    format!("{} {}-{}", self.subject, self.start, self.end)
  }
}

/// First entry in sequence order whose interval contains `now`.
pub fn select_slot(entries: &[TimetableEntry], now: ClockTime) -> Option<&TimetableEntry> {
  entries.iter().find(|e| e.contains(now))
}

/// A validated, ordered set of slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timetable {
  entries: Vec<TimetableEntry>,
}

impl Timetable {
  /// Validate slots: non-empty, each `start < end`, no two overlapping.
  pub fn validate(mut entries: Vec<TimetableEntry>) -> Result<Self, TimetableError> {
    if entries.is_empty() {
      return Err(TimetableError::Empty);
    }

    for entry in &mut entries {
      if entry.start >= entry.end {
        return Err(TimetableError::InvalidSlot(entry.label()));
      }
      let derived = entry.derived_duration();
      if entry.duration_minutes != derived {
        tracing::warn!(
          "Slot {} declares {} minutes but spans {}; using {}",
          entry.label(),
          entry.duration_minutes,
          derived,
          derived
        );
        entry.duration_minutes = derived;
      }
    }

    for (i, a) in entries.iter().enumerate() {
      if let Some(b) = entries[i + 1..].iter().find(|b| a.overlaps(b)) {
        return Err(TimetableError::Conflict {
          first: a.label(),
          second: b.label(),
        });
      }
    }

    Ok(Self { entries })
  }

  pub fn entries(&self) -> &[TimetableEntry] {
    &self.entries
  }

  pub fn current_slot(&self, now: ClockTime) -> Option<&TimetableEntry> {
    select_slot(&self.entries, now)
  }

  /// First slot (in sequence order) that has not started yet
  pub fn next_slot(&self, now: ClockTime) -> Option<&TimetableEntry> {
    self.entries.iter().find(|e| e.start > now)
  }
}

/// Lock state of the timetable. `Draft -> Fixed` happens once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimetableState {
  #[default]
  Draft,
  Fixed(Timetable),
}

impl TimetableState {
  pub fn lock(&mut self, entries: Vec<TimetableEntry>) -> Result<(), TimetableError> {
    if self.is_fixed() {
      return Err(TimetableError::AlreadyLocked);
    }
    *self = Self::Fixed(Timetable::validate(entries)?);
    Ok(())
  }

  pub fn is_fixed(&self) -> bool {
    matches!(self, Self::Fixed(_))
  }

  pub fn timetable(&self) -> Option<&Timetable> {
    match self {
      Self::Fixed(timetable) => Some(timetable),
      Self::Draft => None,
    }
  }
}

/// Suggested day plan shown in the editor before the student locks anything
pub fn default_proposal() -> Vec<TimetableEntry> {
  let slot = |subject, start: (u8, u8), end: (u8, u8)| {
    TimetableEntry::new(
      subject,
      ClockTime { hour: start.0, minute: start.1 },
      ClockTime { hour: end.0, minute: end.1 },
    )
  };
  vec![
    slot(SubjectId::Myanmar, (8, 0), (9, 30)),
    slot(SubjectId::English, (9, 45), (11, 15)),
    slot(SubjectId::Math, (12, 30), (14, 30)),
    slot(SubjectId::History, (14, 45), (16, 0)),
    slot(SubjectId::Geography, (19, 0), (20, 30)),
  ]
}
