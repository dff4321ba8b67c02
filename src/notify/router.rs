//! Push event routing.
//!
//! Maps each named push event of the hub's catalog to an optional toast and
//! an optional domain event. Routing is a pure function of one message:
//! no state, no coalescing, and no failure. A missing or mistyped field
//! falls back to its default.

use std::time::Duration;

use tracing::debug;

use crate::domain::events::{DomainEvent, DomainEventKind, PushMessage, RunOutcome, ServerStatus};
use crate::domain::payload::Payload;
use crate::domain::run::{Step, StepChange, StepStatus};
use crate::domain::timestamp::LastRun;

use super::toast::{ToastKind, ToastSpec, DEFAULT_DURATION};

const SHORT: Duration = Duration::from_millis(3000);
const STEP_COMPLETED: Duration = Duration::from_millis(4000);
const STEP_ERROR: Duration = Duration::from_millis(8000);
const LONG: Duration = Duration::from_millis(10000);

/// The push events the console subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEvent {
    GeneratingReport,
    Notification,
    ProcessStarted,
    ProcessCompleted,
    ProcessError,
    ProgressUpdate,
    ProcessStepUpdate,
    ProcessStepsInit,
    ProcessFinished,
    ServerStatusUpdate,
}

impl PushEvent {
    pub const ALL: [PushEvent; 10] = [
        Self::GeneratingReport,
        Self::Notification,
        Self::ProcessStarted,
        Self::ProcessCompleted,
        Self::ProcessError,
        Self::ProgressUpdate,
        Self::ProcessStepUpdate,
        Self::ProcessStepsInit,
        Self::ProcessFinished,
        Self::ServerStatusUpdate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GeneratingReport => "GeneratingReport",
            Self::Notification => "Notification",
            Self::ProcessStarted => "ProcessStarted",
            Self::ProcessCompleted => "ProcessCompleted",
            Self::ProcessError => "ProcessError",
            Self::ProgressUpdate => "ProgressUpdate",
            Self::ProcessStepUpdate => "ProcessStepUpdate",
            Self::ProcessStepsInit => "ProcessStepsInit",
            Self::ProcessFinished => "ProcessFinished",
            Self::ServerStatusUpdate => "ServerStatusUpdate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }
}

/// Result of routing one push message
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Routed {
    pub toast: Option<ToastSpec>,
    pub event: Option<DomainEvent>,
}

/// Stateless router from push messages to toasts and domain events.
#[derive(Debug, Clone)]
pub struct EventRouter {
    default_duration: Duration,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}

impl EventRouter {
    pub fn new(default_duration: Duration) -> Self {
        Self { default_duration }
    }

    pub fn route(&self, message: &PushMessage) -> Routed {
        let Some(kind) = PushEvent::from_name(&message.name) else {
            debug!(name = %message.name, "Ignoring push event outside the catalog");
            return Routed::default();
        };

        let p = Payload::new(&message.payload);
        let time = p.timestamp("time");
        let event = |kind| Some(DomainEvent::new(kind, message.received_at));

        match kind {
            PushEvent::GeneratingReport => Routed {
                toast: Some(
                    ToastSpec::new(ToastKind::Processing, "ICM Process", p.text("status").unwrap_or_default())
                        .with_duration(SHORT)
                        .with_time(time),
                ),
                event: None,
            },

            PushEvent::Notification => {
                let duration = p
                    .millis("duration")
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis)
                    .unwrap_or(self.default_duration);
                Routed {
                    toast: Some(
                        ToastSpec::new(
                            p.text("type").map(|t| ToastKind::parse(&t)).unwrap_or_default(),
                            p.text("title").unwrap_or_else(|| "Notification".to_string()),
                            p.text("message").unwrap_or_default(),
                        )
                        .with_duration(duration)
                        .with_time(time),
                    ),
                    event: None,
                }
            }

            PushEvent::ProcessStarted => Routed {
                toast: Some(
                    ToastSpec::info(
                        "Process Started",
                        p.text("status")
                            .unwrap_or_else(|| "ICM calculation process has started.".to_string()),
                    )
                    .with_duration(self.default_duration)
                    .with_time(time),
                ),
                event: None,
            },

            PushEvent::ProcessCompleted => Routed {
                toast: Some(
                    ToastSpec::success(
                        "Process Completed",
                        p.text("status")
                            .unwrap_or_else(|| "ICM calculation completed successfully.".to_string()),
                    )
                    .with_duration(LONG)
                    .with_time(time),
                ),
                event: None,
            },

            PushEvent::ProcessError => Routed {
                toast: Some(
                    ToastSpec::error(
                        "Process Error",
                        p.text("status")
                            .unwrap_or_else(|| "An error occurred during the process.".to_string()),
                    )
                    .sticky()
                    .with_time(time),
                ),
                event: None,
            },

            PushEvent::ProgressUpdate => Routed {
                toast: Some(
                    ToastSpec::new(
                        ToastKind::Processing,
                        p.text("step").unwrap_or_else(|| "Processing".to_string()),
                        p.text("status").unwrap_or_default(),
                    )
                    .with_duration(SHORT)
                    .with_time(time),
                ),
                event: None,
            },

            PushEvent::ProcessStepUpdate => {
                let status = p.present_str("status").and_then(StepStatus::parse);
                let (toast_kind, duration) = match status {
                    Some(StepStatus::InProgress) => (ToastKind::Processing, SHORT),
                    Some(StepStatus::Completed) => (ToastKind::Success, STEP_COMPLETED),
                    Some(StepStatus::Error) => (ToastKind::Error, STEP_ERROR),
                    _ => (ToastKind::Info, SHORT),
                };
                let change = StepChange {
                    step_id: p.text("stepId").unwrap_or_default(),
                    step_name: p.text("stepName"),
                    status,
                    message: p.present_str("message").map(str::to_string),
                    time,
                };
                Routed {
                    toast: Some(
                        ToastSpec::new(
                            toast_kind,
                            p.text("stepName").unwrap_or_else(|| "Process Step".to_string()),
                            p.text("message").unwrap_or_default(),
                        )
                        .with_duration(duration)
                        .with_time(time),
                    ),
                    event: event(DomainEventKind::StepUpdate(change)),
                }
            }

            PushEvent::ProcessStepsInit => {
                let steps = p
                    .list("steps")
                    .map(|list| list.iter().filter_map(Step::from_value).collect());
                Routed {
                    toast: None,
                    event: event(DomainEventKind::StepsInit(steps)),
                }
            }

            PushEvent::ProcessFinished => {
                let success = p.flag("success").unwrap_or(false);
                let (toast_kind, title) = if success {
                    (ToastKind::Success, "Process Completed")
                } else {
                    (ToastKind::Error, "Process Failed")
                };
                Routed {
                    toast: Some(
                        ToastSpec::new(toast_kind, title, p.text("message").unwrap_or_default())
                            .with_duration(LONG)
                            .with_time(time),
                    ),
                    event: event(DomainEventKind::RunFinished(RunOutcome {
                        success,
                        message: p.text("message"),
                        time,
                    })),
                }
            }

            PushEvent::ServerStatusUpdate => Routed {
                toast: None,
                event: event(DomainEventKind::ServerStatus(ServerStatus {
                    status: p.text("status"),
                    last_run: p.present_str("dtLastRun").filter(|s| !s.is_empty()).map(LastRun::parse),
                })),
            },
        }
    }
}
