//! Run and step state.
//!
//! A run is one execution of the backend ICM calculation, made of steps the
//! server names and reports on. The server is authoritative over which steps
//! exist and what state they are in.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::payload::Payload;
use super::timestamp::{self, Timestamp};

/// Status of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started yet
    #[default]
    Pending,

    /// Currently executing
    InProgress,

    /// Finished successfully
    Completed,

    /// Finished with an error
    Error,
}

impl StepStatus {
    /// Parse the server vocabulary. Unknown values are "not provided".
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// `completed` and `error` are only left through a tracker reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Single-character marker used by the terminal renderer.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Pending => "○",
            Self::InProgress => "◐",
            Self::Completed => "●",
            Self::Error => "✕",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One phase of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Unique key within a run
    pub step_id: String,

    /// Display name (falls back to the id)
    pub step_name: String,

    pub status: StepStatus,

    pub message: String,

    /// Time of the last update, when the server sent one
    pub updated_at: Option<Timestamp>,
}

impl Step {
    pub fn new(step_id: impl Into<String>, step_name: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            step_name: step_name.into(),
            status: StepStatus::Pending,
            message: String::new(),
            updated_at: None,
        }
    }

    pub fn with_status(mut self, status: StepStatus) -> Self {
        self.status = status;
        self
    }

    /// Read a step out of a snapshot or `ProcessStepsInit` entry.
    /// Entries without a `stepId` are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let p = Payload::new(value);
        let step_id = p.text("stepId")?;
        let step_name = p.text("stepName").unwrap_or_else(|| step_id.clone());
        Some(Self {
            step_name,
            status: p
                .present_str("status")
                .and_then(StepStatus::parse)
                .unwrap_or_default(),
            message: p.text("message").unwrap_or_default(),
            updated_at: p.timestamp("time"),
            step_id,
        })
    }

    /// `HH:MM:SS` of the last update, `—` when unknown.
    pub fn time_label(&self) -> String {
        timestamp::time_label(self.updated_at.as_ref())
    }
}

/// A partial update to one step, as pushed by `ProcessStepUpdate`.
///
/// `None` fields were not provided and preserve the previous value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepChange {
    pub step_id: String,
    pub step_name: Option<String>,
    pub status: Option<StepStatus>,
    pub message: Option<String>,
    pub time: Option<Timestamp>,
}

impl StepChange {
    pub fn new(step_id: impl Into<String>, status: StepStatus) -> Self {
        Self {
            step_id: step_id.into(),
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.step_name = Some(name.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// The authoritative "current run state" returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessSnapshot {
    pub is_running: bool,
    pub start_time: Option<Timestamp>,
    pub steps: Vec<Step>,
    /// `None` means unknown: no terminal result is being held
    pub success: Option<bool>,
    pub finish_message: Option<String>,
}

impl ProcessSnapshot {
    /// Decode a `GetProcessState` body without ever failing.
    pub fn from_value(value: &Value) -> Self {
        let p = Payload::new(value);
        Self {
            is_running: p.flag("isRunning").unwrap_or(false),
            start_time: p.timestamp("startTime"),
            steps: p
                .list("steps")
                .map(|steps| steps.iter().filter_map(Step::from_value).collect())
                .unwrap_or_default(),
            success: p.flag("success"),
            finish_message: p.text("finishMessage").or_else(|| p.text("message")),
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }

    /// A finished run the server is still holding.
    pub fn has_terminal_result(&self) -> bool {
        !self.is_running && self.success.is_some()
    }
}

/// Phase of the run UI
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunPhase {
    /// Nothing running; ready to start
    #[default]
    Idle,

    /// A run is in flight
    Running,

    /// The last run finished successfully
    Succeeded,

    /// The last run (or its start request) failed
    Failed { message: String },
}

impl RunPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// A finished run is on screen, waiting for the operator to acknowledge it.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Idle => "Run ICM Calculation",
            Self::Running => "Process Running",
            Self::Succeeded => "Process Completed",
            Self::Failed { .. } => "Process Failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_vocabulary() {
        assert_eq!(StepStatus::parse("in_progress"), Some(StepStatus::InProgress));
        assert_eq!(StepStatus::parse("done"), None);
        assert!(StepStatus::Error.is_terminal());
        assert!(!StepStatus::InProgress.is_terminal());
        assert_eq!(
            serde_json::to_string(&StepStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }

    #[test]
    fn test_snapshot_running() {
        let body = json!({
            "isRunning": true,
            "startTime": "2025-06-01T08:00:00",
            "steps": [
                {"stepId": "import_siebel_data", "stepName": "Importing Siebel Data", "status": "completed"},
                {"stepId": "calculating", "status": "in_progress", "message": "Employees 10/200"},
                {"stepName": "no id, dropped"}
            ],
            "success": null
        });

        let snapshot = ProcessSnapshot::from_value(&body);

        assert!(snapshot.is_running);
        assert!(!snapshot.has_terminal_result());
        assert_eq!(snapshot.steps.len(), 2);
        assert_eq!(snapshot.steps[1].step_name, "calculating");
        assert_eq!(snapshot.steps[1].message, "Employees 10/200");
        assert_eq!(snapshot.success, None);
    }

    #[test]
    fn test_snapshot_terminal_and_sentinel_start() {
        let body = json!({
            "isRunning": false,
            "startTime": "0001-01-01T00:00:00",
            "success": false,
            "message": "Calculation aborted"
        });

        let snapshot = ProcessSnapshot::from_value(&body);

        assert!(snapshot.has_terminal_result());
        assert_eq!(snapshot.start_time, None);
        assert_eq!(snapshot.finish_message.as_deref(), Some("Calculation aborted"));
    }

    #[test]
    fn test_snapshot_garbage_is_idle() {
        assert_eq!(ProcessSnapshot::from_value(&json!([1, 2, 3])), ProcessSnapshot::idle());
    }
}
