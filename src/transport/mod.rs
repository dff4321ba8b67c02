//! The push channel.
//!
//! - State: the connect/reconnect state machine and its policy
//! - Protocol: hub wire format
//! - Client: the async driver owning the single connection

pub mod client;
pub mod protocol;
pub mod state;

pub use client::{TransportClient, TransportError, TransportControl, TransportEvent, TransportHandle, TransportSettings};
pub use state::{ConnectionMachine, ConnectionState, ReconnectPolicy, TransitionError};
