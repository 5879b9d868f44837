//! Optional JSONL profiling behind the `profiling` feature.
//!
//! With the feature on, handler starts, gateway round trips, exam phase
//! changes and subject switches are appended to a per-run JSONL file. With it
//! off the macros expand to nothing and the functions below are empty.
//!
//! ```ignore
//! shwe_g12::profile_handler!("POST", "/classroom/message");
//! shwe_g12::profile_log!(EventType::ExamTransition { phase: "in_progress".into() });
//! ```

#[cfg(feature = "profiling")]
mod event;
#[cfg(feature = "profiling")]
mod logger;

#[cfg(feature = "profiling")]
pub use event::*;
#[cfg(feature = "profiling")]
pub use logger::*;

#[cfg(not(feature = "profiling"))]
mod disabled {
    use std::time::Duration;

    #[inline(always)]
    pub fn init() {}

    #[inline(always)]
    pub fn shutdown() {}

    #[inline(always)]
    pub fn log_timed(_: &str, _: Duration) {}
}
#[cfg(not(feature = "profiling"))]
pub use disabled::*;

// Macros are defined here to be available at crate root

/// Log a profiling event.
///
/// When the `profiling` feature is disabled, this macro expands to nothing.
///
/// # Examples
///
/// ```ignore
/// profile_log!(EventType::SubjectSwitch {
///     from: "myanmar".into(),
///     to: "history".into()
/// });
/// ```
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! profile_log {
    ($event_type:expr) => {
        $crate::profiling::log_event($event_type)
    };
    ($event_type:expr, $meta:expr) => {
        $crate::profiling::log_event_with_meta($event_type, $meta)
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! profile_log {
    ($($args:tt)*) => {};
}

/// Record that a handler started serving `method route`.
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! profile_handler {
    ($method:expr, $route:expr) => {
        $crate::profiling::log_event($crate::profiling::EventType::HandlerStart {
            route: ($route).to_string(),
            method: ($method).to_string(),
        })
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! profile_handler {
    ($($args:tt)*) => {};
}

/// Execute a block and log its duration.
///
/// When the `profiling` feature is disabled, this macro just executes the block.
///
/// # Examples
///
/// ```ignore
/// let images = profile_scope!("decode_batch", {
///     decode_batch(&uploads)
/// });
/// ```
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! profile_scope {
    ($name:expr, $body:block) => {{
        let _start = std::time::Instant::now();
        let result = $body;
        $crate::profiling::log_timed($name, _start.elapsed());
        result
    }};
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! profile_scope {
    ($name:expr, $body:block) => {
        $body
    };
}
