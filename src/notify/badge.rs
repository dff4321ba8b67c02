//! Ambient connection badge.

use std::time::Duration;

use crate::core::timer::{Scheduler, TimerFired, TimerKey, TimerSlot};
use crate::transport::ConnectionState;

/// How long the badge stays up after the connection is established
pub const HIDE_AFTER_CONNECTED: Duration = Duration::from_millis(3000);

/// Shows the push connection state; flashes briefly once connected and
/// stays up for anything else.
#[derive(Debug)]
pub struct ConnectionBadge {
    scheduler: Scheduler,
    hide_after: Duration,
    state: ConnectionState,
    text: &'static str,
    visible: bool,
    hide_timer: TimerSlot,
}

impl ConnectionBadge {
    pub fn new(scheduler: Scheduler, hide_after: Duration) -> Self {
        Self {
            scheduler,
            hide_after,
            state: ConnectionState::Idle,
            text: "Connecting...",
            visible: false,
            hide_timer: TimerSlot::new(),
        }
    }

    pub fn update(&mut self, state: ConnectionState) {
        let previous = self.state;
        self.state = state;
        self.text = match state {
            ConnectionState::Idle | ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Reconnecting => "Reconnecting...",
            ConnectionState::Disconnected if previous == ConnectionState::Connecting => {
                "Connection failed"
            }
            ConnectionState::Disconnected => "Disconnected",
        };
        self.visible = true;

        if state == ConnectionState::Connected {
            self.scheduler
                .schedule(&mut self.hide_timer, TimerKey::BadgeHide, self.hide_after);
        } else {
            self.hide_timer.cancel();
        }
    }

    /// Returns whether the badge changed.
    pub fn on_timer(&mut self, fired: &TimerFired) -> bool {
        if fired.key != TimerKey::BadgeHide || !self.hide_timer.accept(fired) {
            return false;
        }
        self.visible = false;
        true
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn text(&self) -> &'static str {
        self.text
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}
