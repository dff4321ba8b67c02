//! Owned, cancellable timers.
//!
//! Every timer in the console (toast dismiss and exit windows, badge
//! auto-hide, the run clock) lives in a [`TimerSlot`] owned by the component
//! that scheduled it. Scheduling into a slot aborts whatever the slot held
//! before and bumps its generation, so a firing from a superseded timer is
//! rejected by [`TimerSlot::accept`] even if it was already queued.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::notify::toast::ToastId;

/// What a timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Auto-dismiss or exit window of one toast
    Toast(ToastId),

    /// Connection badge auto-hide
    BadgeHide,

    /// Run panel elapsed-time tick
    RunClock,
}

/// A timer that went off, delivered to the shell's inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub key: TimerKey,
    pub generation: u64,
}

/// Spawns timer tasks that report back over a channel.
#[derive(Debug, Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<TimerFired>,
}

impl Scheduler {
    /// A scheduler and the receiving end its firings arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Arm `slot` to fire `key` after `delay`, replacing anything it held.
    pub fn schedule(&self, slot: &mut TimerSlot, key: TimerKey, delay: Duration) {
        slot.cancel();
        slot.generation += 1;

        let fired = TimerFired {
            key,
            generation: slot.generation,
        };
        let tx = self.tx.clone();
        slot.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the shell shut down
            let _ = tx.send(fired);
        }));
    }
}

/// Holder of at most one pending timer.
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Whether `fired` is the live timer of this slot. Disarms the slot
    /// when it is.
    pub fn accept(&mut self, fired: &TimerFired) -> bool {
        if self.pending.is_some() && fired.generation == self.generation {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
