//! Error types for the tutor.
//!
//! Each component has its own enum so callers can match on the failures they
//! can actually recover from; [`TutorError`] wraps them all at the HTTP edge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure talking to the AI service. Carries nothing meant for the student.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Gateway request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication rejected: {0}")]
    Authentication(String),

    #[error("Quota exhausted or rate limited")]
    RateLimited,

    #[error("Gateway returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Gateway response had no usable content")]
    EmptyResponse,

    #[error("Failed to parse gateway response: {0}")]
    Parse(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExamGenerationError {
    #[error("Exam request failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Malformed exam payload: {0}")]
    Malformed(String),
}

/// A lesson image in an upload batch could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Could not read image #{} ({name}): {reason}", .index + 1)]
pub struct ImageDecodeError {
    pub index: usize,
    pub name: String,
    pub reason: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassroomError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Upload lesson images before asking the teacher")]
    NoMaterial,

    #[error("The teacher is still answering the previous question")]
    Busy,

    #[error("The classroom was switched to another subject")]
    Superseded,

    #[error(transparent)]
    ImageDecode(#[from] ImageDecodeError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimetableError {
    #[error("Timetable is already fixed for today")]
    AlreadyLocked,

    #[error("Timetable slots overlap: {first} and {second}")]
    Conflict { first: String, second: String },

    #[error("Slot must end after it starts: {0}")]
    InvalidSlot(String),

    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("Timetable has no slots")]
    Empty,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExamError {
    #[error("Exam is not in progress")]
    NotInProgress,

    #[error("Exam is already finished")]
    Finished,

    #[error("No question with id {0}")]
    UnknownQuestion(u32),

    #[error("Upload lesson images before taking an exam")]
    NoMaterial,

    #[error("No exam has been started")]
    NoExam,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing credential: set {0} (or [gateway] api_key in config.toml)")]
    MissingCredential(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Umbrella error used at the HTTP boundary
#[derive(Error, Debug)]
pub enum TutorError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    ExamGeneration(#[from] ExamGenerationError),

    #[error(transparent)]
    Classroom(#[from] ClassroomError),

    #[error(transparent)]
    Timetable(#[from] TimetableError),

    #[error(transparent)]
    Exam(#[from] ExamError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown {kind}: {value}")]
    NotFound { kind: &'static str, value: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TutorError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Gateway(_) | Self::ExamGeneration(_) => StatusCode::BAD_GATEWAY,
            Self::Classroom(ClassroomError::Busy | ClassroomError::Superseded) => {
                StatusCode::CONFLICT
            }
            Self::Classroom(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Timetable(TimetableError::AlreadyLocked | TimetableError::Conflict { .. }) => {
                StatusCode::CONFLICT
            }
            Self::Timetable(_) => StatusCode::BAD_REQUEST,
            Self::Exam(ExamError::UnknownQuestion(_)) => StatusCode::BAD_REQUEST,
            Self::Exam(_) => StatusCode::CONFLICT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TutorError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
    /// Log the error at warn level and return None
    fn log_warn(self, context: &str) -> Option<T>;
    /// Log the error at warn level and return the default
    fn log_warn_default(self, context: &str) -> T
    where
        T: Default;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                None
            }
        }
    }

    fn log_warn_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                T::default()
            }
        }
    }
}
