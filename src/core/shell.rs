//! The application shell.
//!
//! `Console` owns every component of a session and is the only place that
//! mutates them. Background work (the transport, timers, HTTP requests)
//! reports back as messages, and the shell handles those one at a time on
//! a single thread, so no two handlers ever interleave.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{ControlApi, RequestError};
use crate::domain::run::RunPhase;
use crate::notify::badge::{ConnectionBadge, HIDE_AFTER_CONNECTED};
use crate::notify::router::EventRouter;
use crate::notify::toast::{ToastId, ToastManager, ToastSettings, ToastSpec};
use crate::process::header::{HeaderStatusWidget, ServerInfo};
use crate::process::reconcile::{ProcessStateReconciler, Reconciliation};
use crate::process::runner::RunPanel;
use crate::transport::{ConnectionState, TransportControl, TransportEvent};

use super::bus::{Effect, EventBus};
use super::timer::{Scheduler, TimerFired, TimerKey};

/// Shown when a rejected start request carries no explanation
pub const DEFAULT_START_FAILURE: &str = "Failed to run ICM process";

/// Operator actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a run
    StartRun,
    /// Acknowledge the finished run and return to idle
    Acknowledge,
    CloseToast(ToastId),
    ClearToasts,
    /// Drop the push connection and connect again right away
    Reconnect,
    Shutdown,
}

/// Everything the shell reacts to
#[derive(Debug)]
pub enum ShellMessage {
    Transport(TransportEvent),
    Timer(TimerFired),
    Reconciled(Reconciliation),
    ServerInfo(Result<ServerInfo, RequestError>),
    StartResult(Result<(), RequestError>),
    Acknowledged,
    Command(Command),
}

/// Outcome of handling one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Something visible changed
    Changed,
    Unchanged,
    Exit,
}

/// Session tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub toasts: ToastSettings,
    pub badge_hide_after: Duration,
    pub announce_acknowledged: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            toasts: ToastSettings::default(),
            badge_hide_after: HIDE_AFTER_CONNECTED,
            announce_acknowledged: true,
        }
    }
}

/// Receiving side of the shell: replies from background work and timers.
#[derive(Debug)]
pub struct Inbox {
    messages: mpsc::UnboundedReceiver<ShellMessage>,
    timers: mpsc::UnboundedReceiver<TimerFired>,
}

impl Inbox {
    /// Next message from background work or a timer.
    pub async fn recv(&mut self) -> Option<ShellMessage> {
        tokio::select! {
            Some(message) = self.messages.recv() => Some(message),
            Some(fired) = self.timers.recv() => Some(ShellMessage::Timer(fired)),
            else => None,
        }
    }
}

/// Sends operator commands into a running console.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<ShellMessage>,
}

impl CommandSender {
    /// Returns `false` once the console has shut down.
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(ShellMessage::Command(command)).is_ok()
    }
}

/// One console session.
pub struct Console {
    router: EventRouter,
    toasts: ToastManager,
    badge: ConnectionBadge,
    bus: EventBus,
    panel: Rc<RefCell<RunPanel>>,
    header: Rc<RefCell<HeaderStatusWidget>>,
    api: Arc<dyn ControlApi>,
    reconciler: ProcessStateReconciler,
    tx: mpsc::UnboundedSender<ShellMessage>,
    transport: Option<TransportControl>,
    /// Set while the push channel is down; events sent meanwhile are lost
    missed_events: bool,
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("toasts", &self.toasts.len())
            .field("connection", &self.badge.state())
            .field("bus", &self.bus)
            .finish()
    }
}

impl Console {
    pub fn new(api: Arc<dyn ControlApi>, settings: ConsoleSettings) -> (Self, Inbox) {
        let (scheduler, timers) = Scheduler::channel();
        let (tx, messages) = mpsc::unbounded_channel();

        let panel = Rc::new(RefCell::new(RunPanel::new(scheduler.clone())));
        let header = Rc::new(RefCell::new(HeaderStatusWidget::new()));

        let mut bus = EventBus::new();
        bus.subscribe(&panel);
        bus.subscribe(&header);

        let console = Self {
            router: EventRouter::new(settings.toasts.default_duration),
            toasts: ToastManager::with_settings(scheduler.clone(), settings.toasts),
            badge: ConnectionBadge::new(scheduler, settings.badge_hide_after),
            bus,
            panel,
            header,
            reconciler: ProcessStateReconciler::new(api.clone(), settings.announce_acknowledged),
            api,
            tx,
            transport: None,
            missed_events: false,
        };
        (console, Inbox { messages, timers })
    }

    pub fn commands(&self) -> CommandSender {
        CommandSender {
            tx: self.tx.clone(),
        }
    }

    /// Let operator commands steer the push connection.
    pub fn attach_transport(&mut self, control: TransportControl) {
        self.transport = Some(control);
    }

    /// Page activation: reconcile with the server and load the header.
    pub fn activate(&self) {
        self.spawn_reconcile();
        self.spawn_server_info();
    }

    /// Handle one message.
    pub fn handle(&mut self, message: ShellMessage) -> Flow {
        match message {
            ShellMessage::Transport(TransportEvent::State(state)) => {
                self.on_connection_state(state);
                Flow::Changed
            }
            ShellMessage::Transport(TransportEvent::Message(push)) => {
                let routed = self.router.route(&push);
                let changed = routed.toast.is_some() || routed.event.is_some();
                if let Some(toast) = routed.toast {
                    self.toasts.show(toast);
                }
                if let Some(event) = routed.event {
                    for effect in self.bus.publish(&event) {
                        match effect {
                            Effect::RefreshServerInfo => self.spawn_server_info(),
                        }
                    }
                }
                flow(changed)
            }
            ShellMessage::Timer(fired) => flow(match fired.key {
                TimerKey::Toast(_) => self.toasts.on_timer(&fired),
                TimerKey::BadgeHide => self.badge.on_timer(&fired),
                TimerKey::RunClock => self.panel.borrow_mut().on_timer(&fired),
            }),
            ShellMessage::Reconciled(outcome) => {
                debug!(?outcome, "Applying reconciliation");
                self.reconciler
                    .apply(outcome, &mut self.panel.borrow_mut(), &mut self.toasts);
                Flow::Changed
            }
            ShellMessage::ServerInfo(result) => {
                self.header.borrow_mut().apply_server_info(result);
                Flow::Changed
            }
            ShellMessage::StartResult(Ok(())) => {
                info!("Start request accepted");
                Flow::Unchanged
            }
            ShellMessage::StartResult(Err(err)) => {
                warn!(error = %err, "Start request failed");
                let message = err
                    .server_message()
                    .unwrap_or(DEFAULT_START_FAILURE)
                    .to_string();
                self.panel.borrow_mut().fail_start(message.clone());
                self.toasts
                    .show(ToastSpec::error("Process Error", message).sticky().now());
                Flow::Changed
            }
            ShellMessage::Acknowledged => {
                let mut panel = self.panel.borrow_mut();
                if panel.is_running() {
                    debug!("Run started before the acknowledgment completed");
                    return Flow::Unchanged;
                }
                panel.reset();
                Flow::Changed
            }
            ShellMessage::Command(command) => self.on_command(command),
        }
    }

    /// Run the session until shutdown or until every input is gone.
    #[instrument(skip_all, fields(session = %Uuid::new_v4()))]
    pub async fn run<R>(
        mut self,
        mut inbox: Inbox,
        mut transport: mpsc::UnboundedReceiver<TransportEvent>,
        mut render: R,
    ) where
        R: FnMut(&ConsoleView),
    {
        info!("Console started");
        self.activate();
        render(&self.view());

        loop {
            let message = tokio::select! {
                Some(event) = transport.recv() => ShellMessage::Transport(event),
                Some(message) = inbox.recv() => message,
                else => break,
            };
            match self.handle(message) {
                Flow::Changed => render(&self.view()),
                Flow::Unchanged => {}
                Flow::Exit => break,
            }
        }
        info!("Console stopped");
    }

    pub fn toasts(&self) -> &ToastManager {
        &self.toasts
    }

    pub fn badge(&self) -> &ConnectionBadge {
        &self.badge
    }

    pub fn panel(&self) -> std::cell::Ref<'_, RunPanel> {
        self.panel.borrow()
    }

    pub fn header(&self) -> std::cell::Ref<'_, HeaderStatusWidget> {
        self.header.borrow()
    }

    pub fn view(&self) -> ConsoleView {
        let panel = self.panel.borrow();
        let tracker = panel.tracker();
        ConsoleView {
            badge: self
                .badge
                .is_visible()
                .then(|| self.badge.text().to_string()),
            header: self.header.borrow().to_string(),
            title: panel.phase().title().to_string(),
            detail: match panel.phase() {
                RunPhase::Failed { message } => Some(message.clone()),
                _ => None,
            },
            elapsed: panel.elapsed_label(),
            progress: panel
                .steps_visible()
                .then(|| tracker.progress_label()),
            steps: if panel.steps_visible() {
                tracker
                    .steps()
                    .iter()
                    .map(|s| {
                        let mut line = format!("{} {} ({})", s.status.marker(), s.step_name, s.time_label());
                        if !s.message.is_empty() {
                            line.push_str(" - ");
                            line.push_str(&s.message);
                        }
                        line
                    })
                    .collect()
            } else {
                Vec::new()
            },
            toasts: self.toasts.toasts().iter().map(ToString::to_string).collect(),
        }
    }

    fn on_connection_state(&mut self, state: ConnectionState) {
        info!(%state, "Push connection state changed");
        self.badge.update(state);

        match state {
            ConnectionState::Reconnecting | ConnectionState::Disconnected => {
                self.missed_events = true;
            }
            ConnectionState::Connected if self.missed_events => {
                self.missed_events = false;
                info!("Reconnected; reconciling missed events");
                self.spawn_reconcile();
                self.spawn_server_info();
            }
            _ => {}
        }
    }

    fn on_command(&mut self, command: Command) -> Flow {
        match command {
            Command::StartRun => {
                if !self.panel.borrow_mut().begin_run() {
                    return Flow::Unchanged;
                }
                let api = self.api.clone();
                self.spawn(async move { ShellMessage::StartResult(api.start_run().await) });
                Flow::Changed
            }
            Command::Acknowledge => {
                if self.panel.borrow().is_running() {
                    debug!("Acknowledge ignored; the run is still in flight");
                    return Flow::Unchanged;
                }
                let api = self.api.clone();
                self.spawn(async move {
                    if let Err(err) = api.reset_process_state().await {
                        warn!(error = %err, "Failed to reset process state");
                    }
                    ShellMessage::Acknowledged
                });
                Flow::Unchanged
            }
            Command::CloseToast(id) => {
                let present = self.toasts.get(id).is_some_and(|t| t.is_live());
                self.toasts.close(id);
                flow(present)
            }
            Command::ClearToasts => {
                self.toasts.clear_all();
                Flow::Changed
            }
            Command::Reconnect => {
                match &self.transport {
                    Some(transport) => {
                        info!("Reconnect requested by operator");
                        transport.reconnect_now();
                    }
                    None => debug!("Reconnect ignored; no push connection attached"),
                }
                Flow::Unchanged
            }
            Command::Shutdown => Flow::Exit,
        }
    }

    fn spawn_reconcile(&self) {
        let reconciler = self.reconciler.clone();
        self.spawn(async move { ShellMessage::Reconciled(reconciler.reconcile().await) });
    }

    fn spawn_server_info(&self) {
        let api = self.api.clone();
        self.spawn(async move { ShellMessage::ServerInfo(ServerInfo::load(api.as_ref()).await) });
    }

    fn spawn<F>(&self, work: F)
    where
        F: Future<Output = ShellMessage> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // The shell may have shut down meanwhile
            let _ = tx.send(work.await);
        });
    }
}

fn flow(changed: bool) -> Flow {
    if changed {
        Flow::Changed
    } else {
        Flow::Unchanged
    }
}

/// Plain-text rendering of the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleView {
    pub badge: Option<String>,
    pub header: String,
    pub title: String,
    pub detail: Option<String>,
    pub elapsed: String,
    pub progress: Option<String>,
    pub steps: Vec<String>,
    pub toasts: Vec<String>,
}

impl fmt::Display for ConsoleView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        if let Some(badge) = &self.badge {
            writeln!(f, "[{badge}]")?;
        }
        writeln!(f)?;
        writeln!(f, "{}  {}", self.title, self.elapsed)?;
        if let Some(detail) = &self.detail {
            writeln!(f, "  {detail}")?;
        }
        if let Some(progress) = &self.progress {
            writeln!(f, "Steps {progress}")?;
            for step in &self.steps {
                writeln!(f, "  {step}")?;
            }
        }
        for toast in &self.toasts {
            writeln!(f, "{toast}")?;
        }
        Ok(())
    }
}
