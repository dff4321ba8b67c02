//! icm-console - live process status for the ICM batch system
//!
//! An operator console that follows a long-running backend calculation
//! ("run") in real time over a push channel, raises toasts for what
//! happens, and reconciles its view with the server's authoritative
//! snapshot whenever it may have missed events.
//!
//! # Architecture
//!
//! Everything visible is owned by one [`Console`] and mutated on a single
//! thread:
//! - The transport delivers named push events and connection states
//! - The router turns each push event into a toast and/or a domain event
//! - The bus hands domain events to the run panel and the header
//! - Timers and HTTP replies come back as messages to the same loop
//!
//! # Modules
//!
//! - `adapters`: Backend control endpoints (HTTP)
//! - `core`: Event bus, timers and the application shell
//! - `domain`: Data structures (Step, ProcessSnapshot, DomainEvent)
//! - `notify`: Event routing, toasts, connection badge
//! - `process`: Step tracking, run panel, reconciliation, header
//! - `transport`: The push channel
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Follow the live process status
//! icm-console watch
//!
//! # Print the server's current process state
//! icm-console state
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod notify;
pub mod process;
pub mod transport;

// Re-export main types at crate root for convenience
pub use adapters::{ControlApi, HttpControlApi, RequestError};
pub use core::{Command, Console, ConsoleSettings, ConsoleView};
pub use domain::{DomainEvent, ProcessSnapshot, PushMessage, Step, StepChange, StepStatus};
pub use notify::{EventRouter, ToastManager, ToastSpec};
pub use process::{HeaderStatusWidget, ProcessStateReconciler, StepTracker};
pub use transport::{ConnectionState, TransportClient};
