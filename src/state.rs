//! Runtime state shared by all handlers.
//!
//! [`AppState`] owns the shell behind a `std::sync::Mutex`, the gateway, the
//! clock and the two recurring timers. The shell lock is only ever taken for
//! synchronous work; gateway calls happen with the lock released.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use crate::config::Config;
use crate::error::LogOnError;
use crate::gateway::TeacherGateway;
use crate::scheduler::{Clock, TickFlow, Ticker};
use crate::shell::{Action, AppShell};

/// The shell, shared between request handlers and timer tasks
pub type SharedShell = Arc<Mutex<AppShell>>;

/// Runtime knobs taken from [`Config`]
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub scheduler_tick: Duration,
    pub exam_tick: Duration,
    pub exam_duration_secs: u32,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scheduler_tick: config.scheduler_tick,
            exam_tick: Duration::from_secs(1),
            exam_duration_secs: config.exam_duration_secs,
        }
    }
}

#[derive(Default)]
struct Timers {
    scheduler: Option<Ticker>,
    countdown: Option<Ticker>,
}

/// Application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    shell: SharedShell,
    pub gateway: Arc<dyn TeacherGateway>,
    pub clock: Arc<dyn Clock>,
    timers: Arc<Mutex<Timers>>,
    pub settings: Settings,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovering poisoned lock");
        poisoned.into_inner()
    })
}

impl AppState {
    pub fn new(gateway: Arc<dyn TeacherGateway>, clock: Arc<dyn Clock>, settings: Settings) -> Self {
        Self {
            shell: Arc::new(Mutex::new(AppShell::new(settings.exam_duration_secs))),
            gateway,
            clock,
            timers: Arc::new(Mutex::new(Timers::default())),
            settings,
        }
    }

    /// Run `f` against the shell, then bring the timers in line with the result.
    pub fn with_shell<R>(&self, f: impl FnOnce(&mut AppShell) -> R) -> R {
        let result = {
            let mut shell = lock(&self.shell);
            f(&mut shell)
        };
        self.sync_timers();
        result
    }

    /// Read-only access without touching the timers
    pub fn read_shell<R>(&self, f: impl FnOnce(&AppShell) -> R) -> R {
        let shell = lock(&self.shell);
        f(&shell)
    }

    pub fn dispatch(&self, action: Action) -> Result<(), crate::error::TutorError> {
        self.with_shell(|shell| shell.dispatch(action))
    }

    /// Compare the timetable against the clock once, as the scheduler does
    pub fn clock_tick(&self) {
        let now = self.clock.now();
        self.dispatch(Action::ClockTick(now))
            .log_warn("Scheduler tick failed");
    }

    pub fn scheduler_running(&self) -> bool {
        lock(&self.timers)
            .scheduler
            .as_ref()
            .is_some_and(Ticker::is_running)
    }

    pub fn countdown_running(&self) -> bool {
        lock(&self.timers)
            .countdown
            .as_ref()
            .is_some_and(Ticker::is_running)
    }

    /// Start or stop timers so they match the shell: the scheduler runs while
    /// the timetable is fixed, the countdown while an exam is in progress.
    fn sync_timers(&self) {
        let (fixed, exam_running) = {
            let shell = lock(&self.shell);
            (shell.timetable().is_fixed(), shell.exam_running())
        };

        let mut timers = lock(&self.timers);

        if fixed {
            if !timers.scheduler.as_ref().is_some_and(Ticker::is_running) {
                timers.scheduler = Some(self.start_scheduler());
            }
        } else if let Some(ticker) = timers.scheduler.take() {
            ticker.stop();
        }

        if exam_running {
            if !timers.countdown.as_ref().is_some_and(Ticker::is_running) {
                timers.countdown = Some(self.start_countdown());
            }
        } else if let Some(ticker) = timers.countdown.take() {
            ticker.stop();
        }
    }

    fn start_scheduler(&self) -> Ticker {
        let shell = Arc::downgrade(&self.shell);
        let clock = self.clock.clone();
        tracing::info!(
            "Timetable scheduler running every {}s",
            self.settings.scheduler_tick.as_secs()
        );
        Ticker::start("scheduler", self.settings.scheduler_tick, move || {
            with_weak(&shell, |shell| {
                shell
                    .dispatch(Action::ClockTick(clock.now()))
                    .log_warn("Scheduler tick failed");
                TickFlow::Continue
            })
        })
    }

    fn start_countdown(&self) -> Ticker {
        let shell = Arc::downgrade(&self.shell);
        Ticker::start("exam countdown", self.settings.exam_tick, move || {
            with_weak(&shell, |shell| {
                shell.exam_tick().log_warn("Exam tick failed");
                if shell.exam_running() {
                    TickFlow::Continue
                } else {
                    TickFlow::Stop
                }
            })
        })
    }
}

/// Run a tick against a shell that may already be gone
fn with_weak(shell: &Weak<Mutex<AppShell>>, f: impl FnOnce(&mut AppShell) -> TickFlow) -> TickFlow {
    match shell.upgrade() {
        Some(shell) => f(&mut lock(&shell)),
        None => TickFlow::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::domain::image::{decode_batch, fixtures};
    use crate::domain::timetable::TimetableEntry;
    use crate::domain::{ClockTime, EncodedImage, ExamDocument, Question, SubjectId};
    use crate::error::{ExamGenerationError, GatewayError};
    use crate::scheduler::FixedClock;
    use crate::shell::View;

    struct EchoGateway;

    #[async_trait]
    impl TeacherGateway for EchoGateway {
        async fn converse(
            &self,
            prompt: &str,
            _images: &[EncodedImage],
            _context: &str,
        ) -> Result<String, GatewayError> {
            Ok(format!("echo: {}", prompt))
        }

        async fn generate_exam(
            &self,
            _subject_name: &str,
            _chapter_title: &str,
            _images: &[EncodedImage],
        ) -> Result<ExamDocument, ExamGenerationError> {
            Ok(ExamDocument {
                questions: vec![Question {
                    id: 1,
                    prompt: "Pick B".into(),
                    options: Some(vec!["A".into(), "B".into()]),
                    correct_answer: "B".into(),
                    marks: 5,
                }],
            })
        }
    }

    fn t(s: &str) -> ClockTime {
        ClockTime::parse(s).unwrap()
    }

    fn state(clock: Arc<FixedClock>, exam_duration_secs: u32) -> AppState {
        AppState::new(
            Arc::new(EchoGateway),
            clock,
            Settings {
                scheduler_tick: Duration::from_secs(60),
                exam_tick: Duration::from_secs(1),
                exam_duration_secs,
            },
        )
    }

    fn start_running_exam(state: &AppState) {
        let images: Vec<EncodedImage> = decode_batch(&[fixtures::png("a.png")]).unwrap();
        state.with_shell(|shell| {
            let ticket = shell.upload_ticket().unwrap();
            shell.commit_upload(ticket, images).unwrap();
            let request = shell.start_exam().unwrap().unwrap();
            let exam = ExamDocument {
                questions: vec![Question {
                    id: 1,
                    prompt: "Pick B".into(),
                    options: None,
                    correct_answer: "B".into(),
                    marks: 5,
                }],
            };
            shell.apply_exam_load(request.ticket, Ok(exam));
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_starts_on_lock_and_switches() {
        let clock = Arc::new(FixedClock::new(t("08:00")));
        let state = state(clock.clone(), 1200);
        assert!(!state.scheduler_running());

        state
            .dispatch(Action::LockTimetable(vec![TimetableEntry::new(
                SubjectId::History,
                t("14:45"),
                t("16:00"),
            )]))
            .unwrap();
        assert!(state.scheduler_running());

        clock.set(t("15:00"));
        tokio::time::sleep(Duration::from_secs(61)).await;

        state.read_shell(|shell| {
            assert_eq!(shell.current_subject_id(), SubjectId::History);
            assert_eq!(shell.view(), View::Classroom);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_runs_only_during_exam() {
        let clock = Arc::new(FixedClock::new(t("08:00")));
        let state = state(clock, 3);
        assert!(!state.countdown_running());

        start_running_exam(&state);
        assert!(state.countdown_running());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        state.read_shell(|shell| {
            assert!(!shell.exam_running());
            assert_eq!(shell.exam().unwrap().remaining_secs(), 0);
            assert_eq!(
                shell.last_exam().unwrap().outcome,
                crate::exam::ExamOutcome::TimedOut
            );
        });
        assert!(!state.countdown_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_stops_countdown() {
        let clock = Arc::new(FixedClock::new(t("08:00")));
        let state = state(clock, 1200);
        start_running_exam(&state);
        state.with_shell(|shell| shell.submit_exam()).unwrap();
        assert!(!state.countdown_running());
    }

    #[tokio::test]
    async fn test_manual_clock_tick() {
        let clock = Arc::new(FixedClock::new(t("12:45")));
        let state = state(clock, 1200);
        state
            .dispatch(Action::LockTimetable(vec![TimetableEntry::new(
                SubjectId::Math,
                t("12:30"),
                t("14:30"),
            )]))
            .unwrap();
        state.clock_tick();
        assert_eq!(state.read_shell(AppShell::current_subject_id), SubjectId::Math);
    }
}
