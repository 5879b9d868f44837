//! JSONL file logger for profiling events.
//!
//! One file per process run, written under `PROFILE_DIR` (default `profiles/`).
//! The logger also keeps running gateway counters so the closing
//! `session_end` line summarises how the AI teacher behaved.

use std::fs::{create_dir_all, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;

use super::event::{EventType, ProfileEvent};

/// Directory used when `PROFILE_DIR` is unset
const DEFAULT_DIR: &str = "profiles";

/// Buffered lines are flushed at least this often
const FLUSH_EVERY: u64 = 50;

static LOGGER: Mutex<Option<ProfileLogger>> = Mutex::new(None);

pub struct ProfileLogger {
    writer: BufWriter<Box<dyn Write + Send>>,
    session_id: String,
    path: PathBuf,
    events: u64,
    gateway_calls: u64,
    gateway_failures: u64,
}

impl ProfileLogger {
    /// Open `profile_<timestamp>.jsonl` in `dir`, creating the directory if needed
    fn open(dir: &Path) -> std::io::Result<Self> {
        let session_id = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        create_dir_all(dir)?;
        let path = dir.join(format!("profile_{}.jsonl", session_id));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            writer: BufWriter::new(Box::new(file)),
            session_id,
            path,
            events: 0,
            gateway_calls: 0,
            gateway_failures: 0,
        })
    }

    fn record(&mut self, event: &ProfileEvent) {
        match &event.event_type {
            EventType::GatewayCall { .. } => self.gateway_calls += 1,
            EventType::GatewayComplete { success: false, .. } => self.gateway_failures += 1,
            _ => {}
        }

        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Unserializable profile event: {}", e);
                return;
            }
        };
        if let Err(e) = writeln!(self.writer, "{}", json) {
            tracing::warn!("Profile write to {} failed: {}", self.path.display(), e);
            return;
        }
        tracing::trace!(target: "profile", "{}", json);

        self.events += 1;
        if self.events % FLUSH_EVERY == 0 {
            self.flush();
        }
    }

    fn closing_event(&self) -> EventType {
        EventType::SessionEnd {
            total_events: self.events,
            gateway_calls: self.gateway_calls,
            gateway_failures: self.gateway_failures,
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("Profile flush failed: {}", e);
        }
    }
}

fn logger() -> MutexGuard<'static, Option<ProfileLogger>> {
    LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn with_logger(f: impl FnOnce(&mut ProfileLogger)) {
    if let Some(logger) = logger().as_mut() {
        f(logger);
    }
}

/// Start a profiling session. Call once from `main` before anything is logged.
pub fn init() {
    let dir = std::env::var("PROFILE_DIR").unwrap_or_else(|_| DEFAULT_DIR.to_string());
    let mut guard = logger();
    if guard.is_some() {
        tracing::warn!("Profiler already initialized");
        return;
    }

    match ProfileLogger::open(Path::new(&dir)) {
        Ok(mut logger) => {
            tracing::info!("Profiling enabled: writing to {}", logger.path.display());
            let start = ProfileEvent::new(EventType::SessionStart {
                session_id: logger.session_id.clone(),
            });
            logger.record(&start);
            *guard = Some(logger);
        }
        Err(e) => tracing::error!("Failed to initialize profiler in {}: {}", dir, e),
    }
}

/// Write the session summary and close the file
pub fn shutdown() {
    let Some(mut logger) = logger().take() else {
        return;
    };
    let end = ProfileEvent::new(logger.closing_event());
    logger.record(&end);
    logger.flush();
    tracing::info!(
        "Profiling session {} ended: {} events, {} gateway calls ({} failed)",
        logger.session_id,
        logger.events,
        logger.gateway_calls,
        logger.gateway_failures
    );
}

pub fn log_event(event_type: EventType) {
    with_logger(|logger| logger.record(&ProfileEvent::new(event_type)));
}

pub fn log_event_with_meta(event_type: EventType, metadata: serde_json::Value) {
    with_logger(|logger| logger.record(&ProfileEvent::with_metadata(event_type, metadata)));
}

/// Record how long a `profile_scope!` block took
pub fn log_timed(name: &str, duration: Duration) {
    let event = ProfileEvent::with_duration(
        EventType::TimedScope {
            name: name.to_string(),
        },
        duration,
    );
    with_logger(|logger| logger.record(&event));
}
