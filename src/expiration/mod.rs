// src/expiration/mod.rs
//! Key expiration monitoring
//!
//! A periodic check compares the key record's creation date with the
//! expiration policy and nags the operator, on every run, once the
//! notification window has been reached.

mod monitor;
mod notify;
mod schedule;

pub use monitor::{ExpirationCheck, ExpirationMonitor, ExpirationPolicy};
pub use notify::{LogNotificationSink, NotificationSink};
#[cfg(feature = "smtp")]
pub use notify::SmtpNotificationSink;
pub use schedule::{spawn_periodic, JobHandle, PeriodicScheduler, ScheduledTask};
