//! Notifications.
//!
//! - Router: push events to toasts and domain events
//! - Toast: the toast area
//! - Badge: the ambient connection badge

pub mod badge;
pub mod router;
pub mod toast;

pub use badge::ConnectionBadge;
pub use router::{EventRouter, PushEvent, Routed};
pub use toast::{Lifecycle, Toast, ToastId, ToastKind, ToastManager, ToastSettings, ToastSpec};
