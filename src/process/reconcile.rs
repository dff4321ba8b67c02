//! Load-time reconciliation against the authoritative run snapshot.
//!
//! Live events only describe changes; the snapshot describes the truth.
//! The shell applies a reconciliation after it completes, so it overrides
//! whatever panel state live events produced in the meantime. Toasts
//! already shown are left alone, and a finished run already on screen
//! stays there until the operator acknowledges it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::adapters::ControlApi;
use crate::domain::run::Step;
use crate::domain::timestamp::Timestamp;
use crate::notify::toast::{ToastManager, ToastSpec};

use super::runner::{RunPanel, DEFAULT_FAILURE_MESSAGE};

const ANNOUNCE_SUCCESS_DURATION: Duration = Duration::from_millis(10000);

/// What the snapshot said, and what was done about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// A run is in flight on the server
    Running {
        start_time: Option<Timestamp>,
        steps: Vec<Step>,
    },

    /// The server held a finished run, which has been acknowledged
    AcknowledgedTerminal {
        success: bool,
        message: Option<String>,
        /// Whether the acknowledgment request itself succeeded
        acknowledged: bool,
    },

    /// Nothing running, nothing held
    Idle,

    /// The snapshot could not be fetched
    Unavailable(String),
}

#[derive(Clone)]
pub struct ProcessStateReconciler {
    api: Arc<dyn ControlApi>,
    announce_acknowledged: bool,
}

impl std::fmt::Debug for ProcessStateReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessStateReconciler")
            .field("announce_acknowledged", &self.announce_acknowledged)
            .finish()
    }
}

impl ProcessStateReconciler {
    pub fn new(api: Arc<dyn ControlApi>, announce_acknowledged: bool) -> Self {
        Self {
            api,
            announce_acknowledged,
        }
    }

    /// Fetch the snapshot and acknowledge a held terminal result.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Reconciliation {
        let snapshot = match self.api.process_state().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "Could not fetch process state");
                return Reconciliation::Unavailable(err.to_string());
            }
        };

        if snapshot.is_running {
            info!(steps = snapshot.steps.len(), "Process is running");
            return Reconciliation::Running {
                start_time: snapshot.start_time,
                steps: snapshot.steps,
            };
        }

        let Some(success) = snapshot.success else {
            info!("No active process");
            return Reconciliation::Idle;
        };

        info!(success, "Acknowledging finished process");
        let acknowledged = match self.api.reset_process_state().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "Failed to acknowledge finished process");
                false
            }
        };

        Reconciliation::AcknowledgedTerminal {
            success,
            message: snapshot.finish_message,
            acknowledged,
        }
    }

    /// Make the panel match the snapshot.
    pub fn apply(&self, outcome: Reconciliation, panel: &mut RunPanel, toasts: &mut ToastManager) {
        match outcome {
            Reconciliation::Running { start_time, steps } => panel.adopt_running(start_time, steps),
            Reconciliation::AcknowledgedTerminal { success, .. } if panel.phase().is_finished() => {
                debug!(success, "Finished run already shown; keeping it until acknowledged");
            }
            Reconciliation::AcknowledgedTerminal {
                success, message, ..
            } => {
                panel.reset();
                if self.announce_acknowledged {
                    toasts.show(announcement(success, message));
                }
            }
            Reconciliation::Idle if panel.phase().is_finished() => {
                debug!("Finished run already shown; keeping it until acknowledged");
            }
            Reconciliation::Idle => panel.reset(),
            Reconciliation::Unavailable(_) => {}
        }
    }
}

fn announcement(success: bool, message: Option<String>) -> ToastSpec {
    if success {
        ToastSpec::success(
            "Process Completed",
            message.unwrap_or_else(|| "The last ICM calculation completed successfully.".to_string()),
        )
        .with_duration(ANNOUNCE_SUCCESS_DURATION)
        .now()
    } else {
        ToastSpec::error(
            "Process Failed",
            message.unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
        )
        .sticky()
        .now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::toast::ToastKind;

    #[test]
    fn test_announcement_policy() {
        let ok = announcement(true, None);
        assert_eq!(ok.kind, ToastKind::Success);
        assert_eq!(ok.duration, Some(ANNOUNCE_SUCCESS_DURATION));

        let failed = announcement(false, Some("Import failed".into()));
        assert_eq!(failed.kind, ToastKind::Error);
        assert_eq!(failed.message, "Import failed");
        assert_eq!(failed.duration, Some(Duration::ZERO));
    }
}
