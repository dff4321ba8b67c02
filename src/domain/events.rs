//! Events flowing through the console.
//!
//! Push messages arrive from the transport in delivery order. The router
//! turns some of them into domain events, which the bus republishes to
//! whichever components subscribed to their topic.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::run::{Step, StepChange};
use super::timestamp::{LastRun, Timestamp};

/// A named event as delivered by the push channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    /// Hub method name, e.g. `ProcessStepUpdate`
    pub name: String,

    /// First invocation argument (`Null` when none was sent)
    pub payload: Value,

    /// When the transport handed the message over
    pub received_at: DateTime<Utc>,
}

impl PushMessage {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Topics of the internal domain events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    StepUpdate,
    StepsInit,
    RunFinished,
    ServerStatus,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StepUpdate => "step-update",
            Self::StepsInit => "steps-init",
            Self::RunFinished => "run-finished",
            Self::ServerStatus => "server-status",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of a run, from `ProcessFinished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub time: Option<Timestamp>,
}

/// Header status pushed by `ServerStatusUpdate`. `None` fields were not sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerStatus {
    pub status: Option<String>,
    pub last_run: Option<LastRun>,
}

/// Payload of a domain event
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEventKind {
    /// A single step changed
    StepUpdate(StepChange),

    /// The full step list of a run; `None` when the payload carried no list
    StepsInit(Option<Vec<Step>>),

    /// The run finished
    RunFinished(RunOutcome),

    /// Header status changed
    ServerStatus(ServerStatus),
}

/// An internally republished notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub kind: DomainEventKind,
    pub received_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(kind: DomainEventKind, received_at: DateTime<Utc>) -> Self {
        Self { kind, received_at }
    }

    pub fn topic(&self) -> Topic {
        match self.kind {
            DomainEventKind::StepUpdate(_) => Topic::StepUpdate,
            DomainEventKind::StepsInit(_) => Topic::StepsInit,
            DomainEventKind::RunFinished(_) => Topic::RunFinished,
            DomainEventKind::ServerStatus(_) => Topic::ServerStatus,
        }
    }

    /// Event name, e.g. `step-update`
    pub fn name(&self) -> &'static str {
        self.topic().as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run::StepStatus;

    #[test]
    fn test_event_names() {
        let event = DomainEvent::new(
            DomainEventKind::StepUpdate(StepChange::new("calculating", StepStatus::InProgress)),
            Utc::now(),
        );
        assert_eq!(event.topic(), Topic::StepUpdate);
        assert_eq!(event.name(), "step-update");

        let event = DomainEvent::new(
            DomainEventKind::ServerStatus(ServerStatus::default()),
            Utc::now(),
        );
        assert_eq!(event.name(), "server-status");
    }
}
