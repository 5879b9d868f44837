//! Recurring timers and the wall clock.
//!
//! A [`Ticker`] owns one tokio task that calls a closure on a fixed period.
//! The task is aborted when the ticker is stopped or dropped, so a timer can
//! never outlive whatever holds its handle.

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::domain::ClockTime;

/// Returned by a tick callback to keep or end the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

pub struct Ticker {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawn the loop. The first tick fires one `period` after start.
    pub fn start<F>(name: &'static str, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> TickFlow + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if on_tick() == TickFlow::Stop {
                    break;
                }
            }
            tracing::debug!("{} ticker finished", name);
        });

        tracing::debug!("{} ticker started ({:?} period)", name, period);
        Self { name, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(&self) {
        if !self.handle.is_finished() {
            tracing::debug!("Stopping {} ticker", self.name);
        }
        self.handle.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Source of the current wall-clock time of day
pub trait Clock: Send + Sync {
    fn now(&self) -> ClockTime;
}

/// Local time from the operating system
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> ClockTime {
        ClockTime::from_time(&chrono::Local::now())
    }
}

/// A clock that only moves when told to
pub struct FixedClock {
    now: Mutex<ClockTime>,
}

impl FixedClock {
    pub fn new(now: ClockTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: ClockTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> ClockTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(count: &Arc<AtomicU32>, stop_after: u32) -> impl FnMut() -> TickFlow + Send + 'static {
        let count = count.clone();
        move || {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= stop_after {
                TickFlow::Stop
            } else {
                TickFlow::Continue
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let count = Arc::new(AtomicU32::new(0));
        let ticker = Ticker::start("test", Duration::from_secs(60), counting(&count, u32::MAX));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(122)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(ticker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_flow_ends_task() {
        let count = Arc::new(AtomicU32::new(0));
        let ticker = Ticker::start("test", Duration::from_secs(1), counting(&count, 2));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!ticker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let count = Arc::new(AtomicU32::new(0));
        let ticker = Ticker::start("test", Duration::from_secs(1), counting(&count, u32::MAX));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        drop(ticker);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let count = Arc::new(AtomicU32::new(0));
        let ticker = Ticker::start("test", Duration::from_secs(1), counting(&count, u32::MAX));
        ticker.stop();
        ticker.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!ticker.is_running());
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(ClockTime::parse("08:00").unwrap());
        assert_eq!(clock.now().to_string(), "08:00");
        clock.set(ClockTime::parse("15:30").unwrap());
        assert_eq!(clock.now().to_string(), "15:30");
    }
}
