use serde::{Deserialize, Serialize};

use super::image::EncodedImage;

/// Curriculum areas offered by the tutor. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectId {
  Myanmar,
  English,
  Math,
  Geography,
  History,
  Economics,
}

impl SubjectId {
  pub const ALL: [SubjectId; 6] = [
    Self::Myanmar,
    Self::English,
    Self::Math,
    Self::Geography,
    Self::History,
    Self::Economics,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Myanmar => "myanmar",
      Self::English => "english",
      Self::Math => "math",
      Self::Geography => "geography",
      Self::History => "history",
      Self::Economics => "economics",
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "myanmar" => Some(Self::Myanmar),
      "english" => Some(Self::English),
      "math" => Some(Self::Math),
      "geography" => Some(Self::Geography),
      "history" => Some(Self::History),
      "economics" => Some(Self::Economics),
      _ => None,
    }
  }

  /// Memorization-heavy subjects get summary/prediction style teaching
  pub fn is_memorization(&self) -> bool {
    matches!(
      self,
      Self::Myanmar | Self::History | Self::Geography | Self::Economics
    )
  }
}

impl std::fmt::Display for SubjectId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// A unit of material within a subject, backed by uploaded lesson images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
  pub id: u32,
  pub title: String,
  pub images: Vec<EncodedImage>,
  pub completed: bool,
  pub lessons_missed: u32,
}

impl Chapter {
  pub fn new(id: u32, title: impl Into<String>) -> Self {
    Self {
      id,
      title: title.into(),
      images: Vec::new(),
      completed: false,
      lessons_missed: 0,
    }
  }

  pub fn image_count(&self) -> usize {
    self.images.len()
  }

  pub fn has_material(&self) -> bool {
    !self.images.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
  pub id: SubjectId,
  pub name: String,
  /// Name in Myanmar script
  pub local_name: String,
  /// Colour token used by the stylesheet (e.g. "red" → `.subject-red`)
  pub color: String,
  pub chapters: Vec<Chapter>,
}

impl Subject {
  pub fn chapter(&self, chapter_id: u32) -> Option<&Chapter> {
    self.chapters.iter().find(|c| c.id == chapter_id)
  }

  /// The chapter a classroom or exam opens on when none is chosen
  pub fn first_chapter(&self) -> Option<&Chapter> {
    self.chapters.first()
  }

  /// Replace the chapter with the same id. Returns false if no chapter matched.
  pub fn replace_chapter(&mut self, chapter: Chapter) -> bool {
    match self.chapters.iter_mut().find(|c| c.id == chapter.id) {
      Some(slot) => {
        *slot = chapter;
        true
      }
      None => false,
    }
  }
}

struct SubjectInfo {
  id: SubjectId,
  name: &'static str,
  local_name: &'static str,
  color: &'static str,
}

const SUBJECTS: [SubjectInfo; 6] = [
  SubjectInfo {
    id: SubjectId::Myanmar,
    name: "Myanmar",
    local_name: "မြန်မာစာ",
    color: "red",
  },
  SubjectInfo {
    id: SubjectId::English,
    name: "English",
    local_name: "အင်္ဂလိပ်စာ",
    color: "blue",
  },
  SubjectInfo {
    id: SubjectId::Math,
    name: "Mathematics",
    local_name: "သင်္ချာ",
    color: "indigo",
  },
  SubjectInfo {
    id: SubjectId::Geography,
    name: "Geography",
    local_name: "ပထဝီဝင်",
    color: "green",
  },
  SubjectInfo {
    id: SubjectId::History,
    name: "History",
    local_name: "သမိုင်း",
    color: "amber",
  },
  SubjectInfo {
    id: SubjectId::Economics,
    name: "Economics",
    local_name: "ဘောဂဗေဒ",
    color: "purple",
  },
];

/// Build the catalog: every subject starts with a single empty "Chapter 1".
pub fn catalog() -> Vec<Subject> {
  SUBJECTS
    .iter()
    .map(|info| Subject {
      id: info.id,
      name: info.name.to_string(),
      local_name: info.local_name.to_string(),
      color: info.color.to_string(),
      chapters: vec![Chapter::new(1, "Chapter 1")],
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_catalog_has_every_subject_once() {
    let subjects = catalog();
    assert_eq!(subjects.len(), SubjectId::ALL.len());
    for id in SubjectId::ALL {
      assert_eq!(subjects.iter().filter(|s| s.id == id).count(), 1);
    }
  }

  #[test]
  fn test_catalog_chapters_start_empty() {
    for subject in catalog() {
      let chapter = subject.first_chapter().unwrap();
      assert_eq!(chapter.id, 1);
      assert!(!chapter.has_material());
      assert!(!chapter.completed);
      assert_eq!(chapter.lessons_missed, 0);
    }
  }

  #[test]
  fn test_subject_id_round_trip() {
    for id in SubjectId::ALL {
      assert_eq!(SubjectId::from_str(id.as_str()), Some(id));
    }
    assert_eq!(SubjectId::from_str("biology"), None);
  }

  #[test]
  fn test_replace_chapter_unknown_id() {
    let mut subject = catalog().remove(0);
    let stray = Chapter::new(42, "Stray");
    assert!(!subject.replace_chapter(stray));
    assert_eq!(subject.chapters.len(), 1);
  }

  #[test]
  fn test_replace_chapter_by_id() {
    let mut subject = catalog().remove(0);
    let mut updated = subject.chapters[0].clone();
    updated.completed = true;
    assert!(subject.replace_chapter(updated));
    assert!(subject.chapters[0].completed);
  }
}
