//! Transient notifications.
//!
//! Toasts are capped at a fixed number of live entries; accepting one more
//! pushes the oldest live toast into its exit transition first. Removal is
//! two-phase: a toast is marked `Exiting`, then physically dropped once the
//! exit window has elapsed.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::core::timer::{Scheduler, TimerFired, TimerKey, TimerSlot};
use crate::domain::timestamp::{self, Timestamp};

/// Maximum number of live toasts
pub const MAX_LIVE_TOASTS: usize = 5;

/// Duration used when a toast request does not carry one
pub const DEFAULT_DURATION: Duration = Duration::from_millis(8000);

/// Visual exit window before a toast is physically removed
pub const EXIT_TRANSITION: Duration = Duration::from_millis(300);

/// Opaque, monotonically assigned toast identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToastId(u64);

impl ToastId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ToastId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "toast-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    Processing,
}

impl ToastKind {
    /// Parse a server-supplied type; anything unknown is `Info`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "warning" => Self::Warning,
            "error" => Self::Error,
            "processing" => Self::Processing,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Processing => "processing",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            Self::Info => "i",
            Self::Success => "✓",
            Self::Warning => "!",
            Self::Error => "✕",
            Self::Processing => "…",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Live,
    Exiting,
}

/// A request to show a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastSpec {
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
    pub time: Option<Timestamp>,
    /// `None` uses the manager's default; zero means sticky
    pub duration: Option<Duration>,
}

impl ToastSpec {
    pub fn new(kind: ToastKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            time: None,
            duration: None,
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastKind::Info, title, message)
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastKind::Success, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastKind::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, title, message)
    }

    /// Processing toasts raised by hand stay until closed.
    pub fn processing(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastKind::Processing, title, message).sticky()
    }

    pub fn with_time(mut self, time: Option<Timestamp>) -> Self {
        self.time = time;
        self
    }

    /// Stamp with the current local time.
    pub fn now(self) -> Self {
        self.with_time(Some(Timestamp::from_utc(Utc::now())))
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn sticky(self) -> Self {
        self.with_duration(Duration::ZERO)
    }
}

/// A toast held by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: ToastId,
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
    pub timestamp: Option<Timestamp>,
    /// Zero means sticky
    pub duration: Duration,
    pub lifecycle: Lifecycle,
}

impl Toast {
    pub fn is_live(&self) -> bool {
        self.lifecycle == Lifecycle::Live
    }

    pub fn is_sticky(&self) -> bool {
        self.duration.is_zero()
    }
}

impl fmt::Display for Toast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ", self.kind.icon(), self.id)?;
        if !self.title.is_empty() {
            write!(f, "{}: ", self.title)?;
        }
        write!(f, "{} ({})", self.message, timestamp::time_label(self.timestamp.as_ref()))?;
        if self.lifecycle == Lifecycle::Exiting {
            write!(f, " ~")?;
        }
        Ok(())
    }
}

/// Tunables of the toast area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastSettings {
    pub max_live: usize,
    pub default_duration: Duration,
    pub exit_transition: Duration,
}

impl Default for ToastSettings {
    fn default() -> Self {
        Self {
            max_live: MAX_LIVE_TOASTS,
            default_duration: DEFAULT_DURATION,
            exit_transition: EXIT_TRANSITION,
        }
    }
}

/// The single toast area of a console session.
#[derive(Debug)]
pub struct ToastManager {
    settings: ToastSettings,
    scheduler: Scheduler,
    /// Oldest first
    toasts: Vec<Toast>,
    timers: HashMap<ToastId, TimerSlot>,
    counter: u64,
}

impl ToastManager {
    pub fn new(scheduler: Scheduler) -> Self {
        Self::with_settings(scheduler, ToastSettings::default())
    }

    pub fn with_settings(scheduler: Scheduler, settings: ToastSettings) -> Self {
        Self {
            settings: ToastSettings {
                max_live: settings.max_live.max(1),
                ..settings
            },
            scheduler,
            toasts: Vec::new(),
            timers: HashMap::new(),
            counter: 0,
        }
    }

    /// Show a toast and return its id.
    pub fn show(&mut self, spec: ToastSpec) -> ToastId {
        while self.live_count() >= self.settings.max_live {
            let Some(oldest) = self.toasts.iter().find(|t| t.is_live()).map(|t| t.id) else {
                break;
            };
            debug!(%oldest, "Evicting oldest live toast");
            self.begin_exit(oldest);
        }

        self.counter += 1;
        let id = ToastId(self.counter);
        let duration = spec.duration.unwrap_or(self.settings.default_duration);

        self.toasts.push(Toast {
            id,
            kind: spec.kind,
            title: spec.title,
            message: spec.message,
            timestamp: spec.time,
            duration,
            lifecycle: Lifecycle::Live,
        });

        let slot = self.timers.entry(id).or_default();
        if !duration.is_zero() {
            self.scheduler.schedule(slot, TimerKey::Toast(id), duration);
        }

        id
    }

    /// Start closing a toast. Absent and already-exiting toasts are left alone.
    pub fn close(&mut self, id: ToastId) {
        self.begin_exit(id);
    }

    /// Start closing every toast.
    pub fn clear_all(&mut self) {
        let ids: Vec<ToastId> = self.toasts.iter().map(|t| t.id).collect();
        for id in ids {
            self.begin_exit(id);
        }
    }

    /// Handle a fired toast timer. Returns whether anything changed.
    pub fn on_timer(&mut self, fired: &TimerFired) -> bool {
        let TimerKey::Toast(id) = fired.key else {
            return false;
        };
        let accepted = self
            .timers
            .get_mut(&id)
            .map(|slot| slot.accept(fired))
            .unwrap_or(false);
        if !accepted {
            return false;
        }

        match self.get(id).map(|t| t.lifecycle) {
            Some(Lifecycle::Live) => {
                self.begin_exit(id);
                true
            }
            Some(Lifecycle::Exiting) => {
                self.toasts.retain(|t| t.id != id);
                self.timers.remove(&id);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ToastId) -> Option<&Toast> {
        self.toasts.iter().find(|t| t.id == id)
    }

    /// Every toast still present (live or exiting), oldest first.
    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn live(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter().filter(|t| t.is_live())
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    fn begin_exit(&mut self, id: ToastId) {
        let Some(toast) = self.toasts.iter_mut().find(|t| t.id == id) else {
            return;
        };
        if toast.lifecycle == Lifecycle::Exiting {
            return;
        }
        toast.lifecycle = Lifecycle::Exiting;

        // The exit window replaces any pending auto-dismiss
        let slot = self.timers.entry(id).or_default();
        self.scheduler
            .schedule(slot, TimerKey::Toast(id), self.settings.exit_transition);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (ToastManager, tokio::sync::mpsc::UnboundedReceiver<TimerFired>) {
        let (scheduler, rx) = Scheduler::channel();
        (ToastManager::new(scheduler), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_monotonic() {
        let (mut toasts, _rx) = manager();
        let a = toasts.show(ToastSpec::info("a", ""));
        let b = toasts.show(ToastSpec::info("b", ""));
        assert!(b > a);
        assert_eq!(a.to_string(), "toast-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sticky_toast_has_no_timer() {
        let (mut toasts, mut rx) = manager();
        let id = toasts.show(ToastSpec::error("Process Error", "boom").sticky());

        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert!(rx.try_recv().is_err());
        assert!(toasts.get(id).unwrap().is_live());
        assert!(toasts.get(id).unwrap().is_sticky());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismiss_then_remove() {
        let (mut toasts, mut rx) = manager();
        let id = toasts.show(ToastSpec::info("t", "m").with_duration(Duration::from_millis(3000)));

        let fired = rx.recv().await.unwrap();
        assert!(toasts.on_timer(&fired));
        assert_eq!(toasts.get(id).unwrap().lifecycle, Lifecycle::Exiting);

        let fired = rx.recv().await.unwrap();
        assert!(toasts.on_timer(&fired));
        assert!(toasts.get(id).is_none());
        assert!(toasts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_replaces_dismiss_timer() {
        let (mut toasts, mut rx) = manager();
        let id = toasts.show(ToastSpec::info("t", "m"));

        toasts.close(id);
        let start = tokio::time::Instant::now();
        let fired = rx.recv().await.unwrap();

        // Only the 300 ms exit window fires, not the 8 s dismiss
        assert_eq!(start.elapsed(), EXIT_TRANSITION);
        assert!(toasts.on_timer(&fired));
        assert!(toasts.get(id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sentinel_time_renders_placeholder() {
        let (mut toasts, _rx) = manager();
        let id = toasts.show(
            ToastSpec::info("Process Started", "go")
                .with_time(Timestamp::parse("0001-01-01T00:00:00")),
        );
        let rendered = toasts.get(id).unwrap().to_string();
        assert!(rendered.ends_with("(—)"), "{rendered}");
        assert!(!rendered.contains("0001"));
    }

    #[test]
    fn test_kind_parse_defaults_to_info() {
        assert_eq!(ToastKind::parse("WARNING"), ToastKind::Warning);
        assert_eq!(ToastKind::parse("shout"), ToastKind::Info);
    }
}
