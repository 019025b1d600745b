//! Email delivery for triggered alarms.
//!
//! The `email-worker` binary consumes `alarm.triggered` events,
//! enriches them into `email.request` events, and delivers through a
//! [`Notifier`] — real SMTP via lettre, or a log-only simulation.

pub mod compose;
pub mod dedup;
pub mod email;
pub mod simulation;
pub mod traits;

pub use compose::notification_for;
pub use dedup::DedupWindow;
pub use email::EmailNotifier;
pub use simulation::SimulationNotifier;
pub use traits::{Notification, Notifier, NotifyError};
