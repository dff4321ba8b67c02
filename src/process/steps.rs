//! Ordered step state of the current run.
//!
//! The server decides which steps exist: an update for an unseen id
//! appends a step rather than failing. The number of completed steps is
//! kept incrementally and always equals a full recount.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::run::{Step, StepChange, StepStatus};

/// Steps shown while a run starts, before the server reports its own
pub const TEMPLATE_STEPS: [(&str, &str); 2] = [
    ("import_siebel_data", "Importing Siebel Data"),
    ("calculating", "Processing Calculations"),
];

/// Ordered steps keyed by `step_id`.
#[derive(Debug, Clone, Default)]
pub struct StepTracker {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
    completed: usize,
}

impl StepTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker holding the two template steps, both pending.
    pub fn with_template() -> Self {
        let mut tracker = Self::new();
        tracker.reset();
        tracker
    }

    /// Replace the whole step set.
    ///
    /// A repeated id keeps its first position and takes the later entry's
    /// values.
    pub fn initialize(&mut self, steps: Vec<Step>) {
        self.steps.clear();
        self.index.clear();

        for step in steps {
            match self.index.get(&step.step_id) {
                Some(&pos) => {
                    debug!(step_id = %step.step_id, "Duplicate step in initial list");
                    self.steps[pos] = step;
                }
                None => {
                    self.index.insert(step.step_id.clone(), self.steps.len());
                    self.steps.push(step);
                }
            }
        }

        self.completed = self.recount();
    }

    /// Merge a partial update. Returns whether a step was touched.
    pub fn update(&mut self, change: StepChange) -> bool {
        if change.step_id.is_empty() {
            debug!("Ignoring step update without a step id");
            return false;
        }

        let Some(&pos) = self.index.get(&change.step_id) else {
            let name = change
                .step_name
                .unwrap_or_else(|| change.step_id.clone());
            let status = change.status.unwrap_or_default();
            let mut step = Step::new(change.step_id.clone(), name).with_status(status);
            if let Some(message) = change.message {
                step.message = message;
            }
            step.updated_at = change.time;

            debug!(step_id = %step.step_id, %status, "Appending step");
            if status == StepStatus::Completed {
                self.completed += 1;
            }
            self.index.insert(change.step_id, self.steps.len());
            self.steps.push(step);
            return true;
        };

        let step = &mut self.steps[pos];
        if let Some(status) = change.status {
            if step.status.is_terminal() && step.status != status {
                warn!(
                    step_id = %step.step_id,
                    from = %step.status,
                    to = %status,
                    "Step left a terminal status"
                );
            }

            match (step.status == StepStatus::Completed, status == StepStatus::Completed) {
                (false, true) => self.completed += 1,
                (true, false) => self.completed -= 1,
                _ => {}
            }
            step.status = status;
        }
        if let Some(name) = change.step_name {
            step.step_name = name;
        }
        if let Some(message) = change.message {
            step.message = message;
        }
        if change.time.is_some() {
            step.updated_at = change.time;
        }
        true
    }

    /// Drop every step and seed the template steps.
    pub fn reset(&mut self) {
        self.initialize(
            TEMPLATE_STEPS
                .iter()
                .map(|(id, name)| Step::new(*id, *name))
                .collect(),
        );
    }

    pub fn completed_count(&self) -> usize {
        self.completed
    }

    /// Count completed steps from scratch.
    pub fn recount(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// `completed / total`
    pub fn progress_label(&self) -> String {
        format!("{} / {}", self.completed, self.steps.len())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn get(&self, step_id: &str) -> Option<&Step> {
        self.index.get(step_id).map(|&pos| &self.steps[pos])
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
