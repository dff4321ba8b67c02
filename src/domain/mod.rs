//! Domain types for the console.
//!
//! This module contains the core data structures:
//! - Events: push messages and the domain events republished from them
//! - Run: steps, run phases and the authoritative run snapshot
//! - Timestamp: server timestamps with the "no value" sentinel
//! - Payload: lenient field access over event payloads

pub mod events;
pub mod payload;
pub mod run;
pub mod timestamp;

// Re-export commonly used types
pub use events::{DomainEvent, DomainEventKind, PushMessage, RunOutcome, ServerStatus, Topic};
pub use payload::Payload;
pub use run::{ProcessSnapshot, RunPhase, Step, StepChange, StepStatus};
pub use timestamp::{LastRun, Timestamp};
