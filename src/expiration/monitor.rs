// src/expiration/monitor.rs
//! Key age check against the expiration policy

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::notify::NotificationSink;
use super::schedule::ScheduledTask;
use crate::consts::{DEFAULT_KEY_EXPIRATION_DAYS, DEFAULT_KEY_EXPIRATION_NOTIFICATION_DAYS};
use crate::engine::EnvelopeKeyManager;
use crate::error::{CoreError, Result};
use crate::key_record::KeyRecordStore;

const DATE_FORMAT: &str = "%b %-d, %Y";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationPolicy {
    pub enabled: bool,
    pub key_expiration_days: u32,
    pub key_expiration_notification_days: u32,
    pub recipient: String,
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            key_expiration_days: DEFAULT_KEY_EXPIRATION_DAYS,
            key_expiration_notification_days: DEFAULT_KEY_EXPIRATION_NOTIFICATION_DAYS,
            recipient: String::new(),
        }
    }
}

impl ExpirationPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.key_expiration_days == 0 {
            return Err(CoreError::Configuration("key_expiration_days must be at least 1".into()));
        }
        if self.key_expiration_notification_days >= self.key_expiration_days {
            return Err(CoreError::Configuration(format!(
                "key_expiration_notification_days ({}) must be less than key_expiration_days ({})",
                self.key_expiration_notification_days, self.key_expiration_days
            )));
        }
        if self.enabled && self.recipient.trim().is_empty() {
            return Err(CoreError::Configuration(
                "expiration checking is enabled but no notification recipient is set".into(),
            ));
        }
        Ok(())
    }

    /// `(notify_on, expires_on)` for a key created at `created`
    pub fn thresholds(&self, created: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let expires_on = created + Duration::days(i64::from(self.key_expiration_days));
        let notify_on = expires_on - Duration::days(i64::from(self.key_expiration_notification_days));
        (notify_on, expires_on)
    }
}

/// What a single check did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpirationCheck {
    Disabled,
    NoRecord,
    NoKeyDate,
    NotDue {
        notify_on: DateTime<Utc>,
        expires_on: DateTime<Utc>,
    },
    Notified {
        expires_on: DateTime<Utc>,
    },
    Failed(String),
}

pub struct ExpirationMonitor {
    identifier: String,
    policy: ExpirationPolicy,
    store: Arc<dyn KeyRecordStore>,
    sink: Arc<dyn NotificationSink>,
}

impl ExpirationMonitor {
    pub fn new(
        identifier: impl Into<String>,
        policy: ExpirationPolicy,
        store: Arc<dyn KeyRecordStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            identifier: identifier.into(),
            policy,
            store,
            sink,
        })
    }

    /// Monitor the key of a running engine
    pub fn for_engine(
        engine: &EnvelopeKeyManager,
        policy: ExpirationPolicy,
        store: Arc<dyn KeyRecordStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        Self::new(engine.identifier(), policy, store, sink)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }

    pub fn run_check(&self) -> ExpirationCheck {
        self.check_at(Utc::now())
    }

    /// Run the check as if the current time were `now`
    pub fn check_at(&self, now: DateTime<Utc>) -> ExpirationCheck {
        if !self.policy.enabled {
            return ExpirationCheck::Disabled;
        }

        let record = match self.store.get(&self.identifier) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(identifier = %self.identifier, "no key record; nothing to check");
                return ExpirationCheck::NoRecord;
            }
            Err(e) => {
                error!(identifier = %self.identifier, error = %e, "unable to load key record");
                return ExpirationCheck::Failed(e.to_string());
            }
        };
        let Some(created) = record.key_created_at else {
            debug!(identifier = %self.identifier, "key record has no key date");
            return ExpirationCheck::NoKeyDate;
        };

        let (notify_on, expires_on) = self.policy.thresholds(created);
        if now < notify_on {
            debug!(
                identifier = %self.identifier,
                notify_on = %notify_on,
                "key is not yet due for rekey"
            );
            return ExpirationCheck::NotDue {
                notify_on,
                expires_on,
            };
        }

        let subject = format!("Crypto key needs to be rekeyed soon! - {}", self.identifier);
        let body = notification_body(&self.identifier, created, expires_on);
        match self.sink.send(&self.policy.recipient, &subject, &body) {
            Ok(()) => {
                info!(
                    identifier = %self.identifier,
                    expires_on = %expires_on,
                    "key expiration notice sent"
                );
                ExpirationCheck::Notified { expires_on }
            }
            Err(e) => {
                error!(identifier = %self.identifier, error = %e, "unable to send expiration notice");
                ExpirationCheck::Failed(e.to_string())
            }
        }
    }
}

impl ScheduledTask for ExpirationMonitor {
    fn name(&self) -> &str {
        "key-expiration"
    }

    fn run(&self) {
        self.run_check();
    }
}

fn notification_body(identifier: &str, created: DateTime<Utc>, expires_on: DateTime<Utc>) -> String {
    format!(
        "The crypto key for {identifier} was created on {} and expires on {}.\n\
         Please rekey it before it expires.\n\
         This notice repeats on every scheduled check until the key is rekeyed.\n",
        created.format(DATE_FORMAT),
        expires_on.format(DATE_FORMAT),
    )
}
