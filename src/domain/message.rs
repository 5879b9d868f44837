use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Model,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::User => "user",
      Self::Model => "model",
    }
  }
}

/// One line of a classroom transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub role: Role,
  pub text: String,
}

impl Message {
  pub fn user(text: impl Into<String>) -> Self {
    Self {
      role: Role::User,
      text: text.into(),
    }
  }

  pub fn model(text: impl Into<String>) -> Self {
    Self {
      role: Role::Model,
      text: text.into(),
    }
  }

  pub fn is_user(&self) -> bool {
    self.role == Role::User
  }
}
