//! The push connection driver.
//!
//! `TransportClient` owns the one WebSocket of a console session and runs
//! as a background task. It reports state changes and push messages over a
//! single channel, so a state change is always seen in order relative to
//! the messages around it. Nothing is buffered across a drop: whatever the
//! server sent while the connection was down is gone, and it is up to the
//! reconciler to recover from that.

use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};

use super::protocol::{self, HubMessage, ProtocolError};
use super::state::{ConnectionMachine, ConnectionState, ReconnectPolicy, TransitionError};
use crate::domain::PushMessage;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors of a single connection attempt or session
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Server closed the connection: {}", .0.as_deref().unwrap_or("no reason given"))]
    ClosedByServer(Option<String>),

    #[error("Socket closed")]
    SocketClosed,

    #[error("Nothing received from the server for {0:?}")]
    ServerTimeout(Duration),
}

/// What the transport reports to its single consumer
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    State(ConnectionState),
    Message(PushMessage),
}

/// Connection settings
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Hub WebSocket URL
    pub url: String,
    pub policy: ReconnectPolicy,
    /// Interval of client keep-alive pings
    pub keepalive: Duration,
    /// Silence after which the connection counts as lost
    pub server_timeout: Duration,
}

impl TransportSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            policy: ReconnectPolicy::default(),
            keepalive: Duration::from_secs(15),
            server_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransportCommand {
    Stop,
    ReconnectNow,
}

/// Cloneable remote for a running transport task
#[derive(Debug, Clone)]
pub struct TransportControl {
    commands: mpsc::UnboundedSender<TransportCommand>,
}

impl TransportControl {
    /// Drop the current connection (or skip the pending retry wait) and
    /// connect again right away.
    pub fn reconnect_now(&self) {
        let _ = self.commands.send(TransportCommand::ReconnectNow);
    }

    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<TransportCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { commands }, rx)
    }
}

/// Handle to the running transport task
pub struct TransportHandle {
    commands: mpsc::UnboundedSender<TransportCommand>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    pub fn control(&self) -> TransportControl {
        TransportControl {
            commands: self.commands.clone(),
        }
    }

    /// Close the connection and wait for the task to end.
    pub async fn stop(self) -> anyhow::Result<()> {
        let _ = self.commands.send(TransportCommand::Stop);
        self.task.await?;
        Ok(())
    }
}

enum SessionEnd {
    Lost(TransportError),
    ReconnectRequested,
    Stopped,
}

/// The push connection owner.
pub struct TransportClient {
    settings: TransportSettings,
    machine: ConnectionMachine,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportClient {
    pub fn new(settings: TransportSettings, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        let machine = ConnectionMachine::new(settings.policy.clone());
        Self {
            settings,
            machine,
            events,
        }
    }

    /// Start the connection loop in the background.
    pub fn spawn(self) -> TransportHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        TransportHandle { commands, task }
    }

    #[instrument(skip_all, fields(url = %self.settings.url))]
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<TransportCommand>) {
        let started = self.machine.begin_connect();
        self.publish(started);

        loop {
            let opened = tokio::select! {
                opened = self.open() => opened,
                cmd = commands.recv() => match cmd {
                    Some(TransportCommand::ReconnectNow) => continue,
                    Some(TransportCommand::Stop) | None => return,
                },
            };

            let delay = match opened {
                Ok((socket, backlog)) => {
                    let connected = self.machine.connected();
                    self.publish(connected);

                    let end = match self.deliver_all(backlog) {
                        Some(end) => end,
                        None => self.pump(socket, &mut commands).await,
                    };
                    match end {
                        SessionEnd::Stopped => return,
                        SessionEnd::ReconnectRequested => info!("Reconnect requested"),
                        SessionEnd::Lost(e) => warn!(error = %e, "Connection lost"),
                    }

                    match self.machine.connection_lost() {
                        Ok(next) => {
                            self.emit_state(next.state);
                            next.delay
                        }
                        Err(e) => {
                            error!(error = %e, "Connection state out of sync");
                            self.settings.policy.retry_after_close
                        }
                    }
                }
                Err(e) => {
                    let before = self.machine.state();
                    warn!(error = %e, attempt = self.machine.attempts() + 1, "Connect attempt failed");
                    match self.machine.attempt_failed() {
                        Ok(next) => {
                            if next.state != before {
                                self.emit_state(next.state);
                            }
                            next.delay
                        }
                        Err(e) => {
                            error!(error = %e, "Connection state out of sync");
                            self.settings.policy.retry_after_close
                        }
                    }
                }
            };

            debug!(?delay, "Waiting before next connect attempt");
            tokio::select! {
                _ = sleep(delay) => {}
                cmd = commands.recv() => match cmd {
                    Some(TransportCommand::ReconnectNow) => {}
                    Some(TransportCommand::Stop) | None => return,
                },
            }

            if self.machine.state() == ConnectionState::Disconnected {
                let restarted = self.machine.begin_connect();
                self.publish(restarted);
            }
        }
    }

    /// Open the socket and complete the hub handshake.
    async fn open(&self) -> Result<(Socket, Vec<HubMessage>), TransportError> {
        let (mut socket, _) = connect_async(self.settings.url.as_str()).await?;
        socket
            .send(Message::Text(protocol::handshake_request()))
            .await?;

        let text = timeout(self.settings.server_timeout, async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => return Ok(text),
                    Some(Ok(Message::Close(_))) | None => return Err(TransportError::SocketClosed),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        })
        .await
        .map_err(|_| TransportError::ServerTimeout(self.settings.server_timeout))??;

        let rest = protocol::parse_handshake_response(&text)?;
        let backlog = protocol::decode_frame(rest)
            .into_iter()
            .filter_map(|m| m.map_err(|e| warn!(error = %e, "Dropping hub message")).ok())
            .collect();

        info!("Push channel handshake complete");
        Ok((socket, backlog))
    }

    /// Read frames until the session ends.
    async fn pump(
        &self,
        socket: Socket,
        commands: &mut mpsc::UnboundedReceiver<TransportCommand>,
    ) -> SessionEnd {
        let (mut sink, mut stream) = socket.split();
        let keepalive_every = self.settings.keepalive;
        let server_timeout = self.settings.server_timeout;
        let mut keepalive = interval_at(Instant::now() + keepalive_every, keepalive_every);
        let silence = sleep(server_timeout);
        tokio::pin!(silence);

        loop {
            tokio::select! {
                frame = stream.next() => {
                    silence.as_mut().reset(Instant::now() + server_timeout);
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            let messages = protocol::decode_frame(&text)
                                .into_iter()
                                .filter_map(|m| m.map_err(|e| warn!(error = %e, "Dropping hub message")).ok())
                                .collect();
                            if let Some(end) = self.deliver_all(messages) {
                                let _ = sink.close().await;
                                return end;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return SessionEnd::Lost(TransportError::SocketClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return SessionEnd::Lost(e.into()),
                    }
                }
                _ = keepalive.tick() => {
                    if let Err(e) = sink.send(Message::Text(protocol::ping_frame())).await {
                        return SessionEnd::Lost(e.into());
                    }
                }
                _ = &mut silence => {
                    let _ = sink.close().await;
                    return SessionEnd::Lost(TransportError::ServerTimeout(server_timeout));
                }
                cmd = commands.recv() => {
                    let _ = sink.close().await;
                    return match cmd {
                        Some(TransportCommand::ReconnectNow) => SessionEnd::ReconnectRequested,
                        Some(TransportCommand::Stop) | None => SessionEnd::Stopped,
                    };
                }
            }
        }
    }

    /// Hand decoded messages to the consumer in arrival order. Returns the
    /// end of the session if one of them closes it.
    fn deliver_all(&self, messages: Vec<HubMessage>) -> Option<SessionEnd> {
        for message in messages {
            match message {
                HubMessage::Invocation { target, arguments } => {
                    let payload = arguments.into_iter().next().unwrap_or(Value::Null);
                    let push = PushMessage {
                        name: target,
                        payload,
                        received_at: Utc::now(),
                    };
                    if self.events.send(TransportEvent::Message(push)).is_err() {
                        return Some(SessionEnd::Stopped);
                    }
                }
                HubMessage::Ping => {}
                HubMessage::Close {
                    error,
                    allow_reconnect,
                } => {
                    info!(allow_reconnect, ?error, "Server closed the hub connection");
                    return Some(SessionEnd::Lost(TransportError::ClosedByServer(error)));
                }
                HubMessage::Ignored(kind) => debug!(kind, "Ignoring hub message"),
            }
        }
        None
    }

    fn publish(&self, transition: Result<ConnectionState, TransitionError>) {
        match transition {
            Ok(state) => self.emit_state(state),
            Err(e) => error!(error = %e, "Connection state out of sync"),
        }
    }

    fn emit_state(&self, state: ConnectionState) {
        info!(%state, "Connection state changed");
        let _ = self.events.send(TransportEvent::State(state));
    }
}
