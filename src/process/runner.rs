//! The run panel: phase, elapsed clock and step list of the current run.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::core::bus::{Effects, Subscriber};
use crate::core::timer::{Scheduler, TimerFired, TimerKey, TimerSlot};
use crate::domain::events::{DomainEvent, DomainEventKind, RunOutcome, Topic};
use crate::domain::run::{RunPhase, Step};
use crate::domain::timestamp::Timestamp;

use super::steps::StepTracker;

/// Elapsed-clock refresh period
pub const CLOCK_TICK: Duration = Duration::from_secs(1);

/// Shown when a run fails without saying why
pub const DEFAULT_FAILURE_MESSAGE: &str = "Process failed";

/// Run UI state.
#[derive(Debug)]
pub struct RunPanel {
    scheduler: Scheduler,
    phase: RunPhase,
    tracker: StepTracker,
    steps_visible: bool,
    /// Origin of the elapsed clock while running
    origin: Option<Instant>,
    /// Time the run had already been going when the clock started
    carried: Duration,
    /// Elapsed time held after the clock stopped
    frozen: Option<Duration>,
    clock: TimerSlot,
}

impl RunPanel {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            phase: RunPhase::Idle,
            tracker: StepTracker::with_template(),
            steps_visible: false,
            origin: None,
            carried: Duration::ZERO,
            frozen: None,
            clock: TimerSlot::new(),
        }
    }

    /// Switch to running for a locally started run. Returns `false` when a
    /// run is already in flight.
    pub fn begin_run(&mut self) -> bool {
        if self.phase.is_running() {
            debug!("Start ignored; a run is already in flight");
            return false;
        }
        self.phase = RunPhase::Running;
        self.tracker.reset();
        self.steps_visible = true;
        self.start_clock(Duration::ZERO);
        true
    }

    /// Take over a run the server reports as in flight.
    pub fn adopt_running(&mut self, start_time: Option<Timestamp>, steps: Vec<Step>) {
        info!(steps = steps.len(), "Restoring running process");
        self.phase = RunPhase::Running;
        if steps.is_empty() {
            self.tracker.reset();
        } else {
            self.tracker.initialize(steps);
        }
        self.steps_visible = true;

        let already = start_time
            .and_then(|ts| ts.to_utc())
            .and_then(|start| (Utc::now() - start).to_std().ok())
            .unwrap_or(Duration::ZERO);
        self.start_clock(already);
    }

    pub fn finish(&mut self, outcome: &RunOutcome) {
        self.phase = if outcome.success {
            RunPhase::Succeeded
        } else {
            RunPhase::Failed {
                message: outcome
                    .message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            }
        };
        self.stop_clock();
    }

    /// The start request itself was rejected.
    pub fn fail_start(&mut self, message: impl Into<String>) {
        self.phase = RunPhase::Failed {
            message: message.into(),
        };
        self.stop_clock();
    }

    /// Back to the neutral idle panel with the step list hidden.
    pub fn reset(&mut self) {
        self.phase = RunPhase::Idle;
        self.tracker.reset();
        self.steps_visible = false;
        self.clock.cancel();
        self.origin = None;
        self.carried = Duration::ZERO;
        self.frozen = None;
    }

    /// Handle a clock tick. Returns whether the panel changed.
    pub fn on_timer(&mut self, fired: &TimerFired) -> bool {
        if fired.key != TimerKey::RunClock || !self.clock.accept(fired) {
            return false;
        }
        if self.phase.is_running() {
            self.scheduler
                .schedule(&mut self.clock, TimerKey::RunClock, CLOCK_TICK);
        }
        true
    }

    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase.is_running()
    }

    pub fn tracker(&self) -> &StepTracker {
        &self.tracker
    }

    pub fn steps_visible(&self) -> bool {
        self.steps_visible
    }

    pub fn elapsed(&self) -> Duration {
        match (self.frozen, self.origin) {
            (Some(frozen), _) => frozen,
            (None, Some(origin)) => self.carried + origin.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    /// `MM:SS`; minutes keep counting past an hour.
    pub fn elapsed_label(&self) -> String {
        let secs = self.elapsed().as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    fn start_clock(&mut self, already: Duration) {
        self.origin = Some(Instant::now());
        self.carried = already;
        self.frozen = None;
        self.scheduler
            .schedule(&mut self.clock, TimerKey::RunClock, CLOCK_TICK);
    }

    fn stop_clock(&mut self) {
        if self.frozen.is_none() && self.origin.is_some() {
            self.frozen = Some(self.elapsed());
        }
        self.clock.cancel();
    }
}

impl Subscriber for RunPanel {
    fn topics(&self) -> &'static [Topic] {
        &[Topic::StepUpdate, Topic::StepsInit, Topic::RunFinished]
    }

    fn on_event(&mut self, event: &DomainEvent, _effects: &mut Effects) {
        match &event.kind {
            DomainEventKind::StepUpdate(change) => {
                if self.tracker.update(change.clone()) {
                    self.steps_visible = true;
                }
            }
            DomainEventKind::StepsInit(Some(steps)) => {
                self.tracker.initialize(steps.clone());
                self.steps_visible = true;
            }
            DomainEventKind::StepsInit(None) => debug!("Step list event without steps"),
            DomainEventKind::RunFinished(outcome) => self.finish(outcome),
            DomainEventKind::ServerStatus(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run::{StepChange, StepStatus};

    fn outcome(success: bool, message: Option<&str>) -> RunOutcome {
        RunOutcome {
            success,
            message: message.map(str::to_string),
            time: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_run_is_ignored_while_running() {
        let (scheduler, _rx) = Scheduler::channel();
        let mut panel = RunPanel::new(scheduler);

        assert!(panel.begin_run());
        panel.on_event(
            &DomainEvent::new(
                DomainEventKind::StepUpdate(StepChange::new("calculating", StepStatus::InProgress)),
                Utc::now(),
            ),
            &mut Effects::default(),
        );
        assert!(!panel.begin_run());

        // The second start did not reset the tracker
        assert_eq!(
            panel.tracker().get("calculating").unwrap().status,
            StepStatus::InProgress
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_ticks_and_freezes_on_finish() {
        let (scheduler, mut rx) = Scheduler::channel();
        let mut panel = RunPanel::new(scheduler);
        panel.begin_run();

        for _ in 0..65 {
            let fired = rx.recv().await.unwrap();
            assert!(panel.on_timer(&fired));
        }
        assert_eq!(panel.elapsed_label(), "01:05");

        panel.finish(&outcome(false, None));
        assert_eq!(
            panel.phase(),
            &RunPhase::Failed {
                message: DEFAULT_FAILURE_MESSAGE.to_string()
            }
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(panel.elapsed_label(), "01:05");
    }

    #[tokio::test(start_paused = true)]
    async fn test_adopt_without_start_time_counts_from_now() {
        let (scheduler, _rx) = Scheduler::channel();
        let mut panel = RunPanel::new(scheduler);

        panel.adopt_running(Timestamp::parse("0001-01-01T00:00:00"), Vec::new());

        assert!(panel.is_running());
        assert_eq!(panel.elapsed_label(), "00:00");
        assert_eq!(panel.tracker().len(), 2);
        assert!(panel.steps_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_adopted_clock_includes_time_before_adoption() {
        let (scheduler, mut rx) = Scheduler::channel();
        let mut panel = RunPanel::new(scheduler);
        let started = Utc::now() - chrono::Duration::minutes(90);

        panel.adopt_running(Some(Timestamp::from_utc(started)), Vec::new());
        assert_eq!(panel.elapsed().as_secs() / 60, 90);

        for _ in 0..60 {
            let fired = rx.recv().await.unwrap();
            assert!(panel.on_timer(&fired));
        }
        assert_eq!(panel.elapsed().as_secs() / 60, 91);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_hides_steps() {
        let (scheduler, _rx) = Scheduler::channel();
        let mut panel = RunPanel::new(scheduler);
        panel.begin_run();
        panel.finish(&outcome(true, Some("done")));
        assert_eq!(panel.phase(), &RunPhase::Succeeded);

        panel.reset();

        assert_eq!(panel.phase(), &RunPhase::Idle);
        assert!(!panel.steps_visible());
        assert_eq!(panel.elapsed_label(), "00:00");
    }
}
