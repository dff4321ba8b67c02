//! Connection state machine and reconnect policy.
//!
//! ```text
//! Idle ──► Connecting ──► Connected ──► Reconnecting ──► Connected
//!              │                             │
//!              ▼                             ▼
//!         Disconnected ◄─────────────── Disconnected
//!              │
//!              └── retry_after_close ──► Connecting   (forever)
//! ```
//!
//! The machine is pure: it decides the next state and the delay before the
//! next attempt, and the async driver in `client.rs` carries them out.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Delays of a reconnect episode, in milliseconds
pub const DEFAULT_RECONNECT_DELAYS_MS: [u64; 5] = [0, 2000, 5000, 10000, 30000];

/// Wait before a fresh connect after the connection is given up
pub const DEFAULT_RETRY_AFTER_CLOSE: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Never started
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        }
    }

    /// Whether `self → to` is an edge of the machine.
    pub fn can_transition_to(&self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, to),
            (Idle, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Reconnecting)
                | (Reconnecting, Connected)
                | (Reconnecting, Disconnected)
                | (Disconnected, Connecting)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid connection transition: {from} → {to}")]
pub struct TransitionError {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Reconnect schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before each attempt of a reconnect episode; the last entry is
    /// reused for attempts beyond the sequence
    pub delays: Vec<Duration>,

    /// Attempts before an episode gives up (`None` = never)
    pub max_attempts: Option<u32>,

    /// Wait between `Disconnected` and the next fresh connect
    pub retry_after_close: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delays: DEFAULT_RECONNECT_DELAYS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            max_attempts: Some(DEFAULT_RECONNECT_DELAYS_MS.len() as u32),
            retry_after_close: DEFAULT_RETRY_AFTER_CLOSE,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (0-based) of an episode.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let idx = (attempt as usize).min(self.delays.len().saturating_sub(1));
        self.delays.get(idx).copied().unwrap_or(Duration::ZERO)
    }

    fn exhausted(&self, attempts_made: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts_made >= max)
    }
}

/// What the driver should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextAttempt {
    /// State after the transition
    pub state: ConnectionState,

    /// Wait before the next connect attempt
    pub delay: Duration,
}

/// The connect/reconnect state machine.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    policy: ReconnectPolicy,
    /// Failed attempts in the current reconnect episode
    attempts: u32,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            policy,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Failed attempts so far in the current reconnect episode.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn transition(&mut self, to: ConnectionState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(to) {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// `Idle | Disconnected → Connecting`
    pub fn begin_connect(&mut self) -> Result<ConnectionState, TransitionError> {
        self.transition(ConnectionState::Connecting)?;
        Ok(self.state)
    }

    /// `Connecting | Reconnecting → Connected`; ends the reconnect episode.
    pub fn connected(&mut self) -> Result<ConnectionState, TransitionError> {
        self.transition(ConnectionState::Connected)?;
        self.attempts = 0;
        Ok(self.state)
    }

    /// An established connection dropped: `Connected → Reconnecting`.
    pub fn connection_lost(&mut self) -> Result<NextAttempt, TransitionError> {
        self.transition(ConnectionState::Reconnecting)?;
        self.attempts = 0;
        Ok(NextAttempt {
            state: self.state,
            delay: self.policy.delay_for(0),
        })
    }

    /// A connect attempt failed. From `Connecting` this gives up straight
    /// away; from `Reconnecting` it walks the delay sequence until the
    /// episode's attempt budget is spent.
    pub fn attempt_failed(&mut self) -> Result<NextAttempt, TransitionError> {
        match self.state {
            ConnectionState::Connecting => {
                self.transition(ConnectionState::Disconnected)?;
                Ok(NextAttempt {
                    state: self.state,
                    delay: self.policy.retry_after_close,
                })
            }
            ConnectionState::Reconnecting => {
                self.attempts += 1;
                if self.policy.exhausted(self.attempts) {
                    self.transition(ConnectionState::Disconnected)?;
                    self.attempts = 0;
                    Ok(NextAttempt {
                        state: self.state,
                        delay: self.policy.retry_after_close,
                    })
                } else {
                    Ok(NextAttempt {
                        state: self.state,
                        delay: self.policy.delay_for(self.attempts),
                    })
                }
            }
            from => Err(TransitionError {
                from,
                to: ConnectionState::Disconnected,
            }),
        }
    }
}
