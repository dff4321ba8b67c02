//! Run tracking.
//!
//! - Steps: ordered step state with a completed count
//! - Runner: the run panel (phase, clock, step list)
//! - Reconcile: load-time reconciliation with the server snapshot
//! - Header: the ambient status header

pub mod header;
pub mod reconcile;
pub mod runner;
pub mod steps;

// Re-export commonly used types
pub use header::{Field, HeaderStatusWidget, ServerInfo};
pub use reconcile::{ProcessStateReconciler, Reconciliation};
pub use runner::RunPanel;
pub use steps::StepTracker;
