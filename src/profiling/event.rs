//! Event types for profiling.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A profiling event with timestamp and optional duration.
#[derive(Serialize)]
pub struct ProfileEvent {
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The type of event
    pub event_type: EventType,
    /// Duration in microseconds (for timed events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_us: Option<u64>,
    /// Additional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ProfileEvent {
    /// Create a new event with the current timestamp.
    pub fn new(event_type: EventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            duration_us: None,
            metadata: None,
        }
    }

    /// Create a new event with duration.
    pub fn with_duration(event_type: EventType, duration: std::time::Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            duration_us: Some(duration.as_micros() as u64),
            metadata: None,
        }
    }

    /// Create a new event with metadata.
    pub fn with_metadata(event_type: EventType, metadata: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            duration_us: None,
            metadata: Some(metadata),
        }
    }
}

/// Types of events that can be logged.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventType {
    // === Session lifecycle ===
    /// Profiling session started
    SessionStart {
        /// Session identifier
        session_id: String,
    },
    /// Profiling session ended
    SessionEnd {
        /// Total events logged
        total_events: u64,
        /// Requests sent to the AI teacher during the session
        gateway_calls: u64,
        /// Of those, how many failed
        gateway_failures: u64,
    },

    // === Handler lifecycle ===
    /// HTTP handler started processing
    HandlerStart {
        /// Route path (e.g., "/classroom/message")
        route: String,
        /// HTTP method
        method: String,
    },

    // === Gateway ===
    /// Request sent to the AI teacher
    GatewayCall {
        /// "converse" or "generate_exam"
        operation: String,
        /// Lesson images attached to the request
        images: usize,
    },
    /// AI teacher request finished
    GatewayComplete {
        operation: String,
        success: bool,
    },

    // === Study state ===
    /// Exam session changed phase
    ExamTransition {
        /// New phase (loading, in_progress, load_failed, submitted, disqualified)
        phase: String,
    },
    /// Current subject changed
    SubjectSwitch {
        from: String,
        to: String,
    },

    // === Timed scope ===
    /// A timed code block completed
    TimedScope {
        /// Name of the scope
        name: String,
    },
}
