//! Core plumbing of a console session.
//!
//! This module contains:
//! - Bus: in-process publish/subscribe for domain events
//! - Timer: owned, cancellable timers
//! - Shell: the `Console` that owns every component and its event loop

pub mod bus;
pub mod shell;
pub mod timer;

// Re-export commonly used types
pub use bus::{Effect, Effects, EventBus, Subscriber};
pub use shell::{Command, CommandSender, Console, ConsoleSettings, ConsoleView, Flow, Inbox, ShellMessage};
pub use timer::{Scheduler, TimerFired, TimerKey, TimerSlot};
