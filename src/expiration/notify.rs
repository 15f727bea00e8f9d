// src/expiration/notify.rs
//! Where expiration notices go

use tracing::info;

use crate::error::NotificationError;

pub trait NotificationSink: Send + Sync {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotificationError>;
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        info!(recipient = %recipient, subject = %subject, body = %body, "expiration notice");
        Ok(())
    }
}

#[cfg(feature = "smtp")]
mod smtp {
    use lettre::message::{header::ContentType, Mailbox};
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{Message, SmtpTransport, Transport};
    use tracing::debug;

    use super::NotificationSink;
    use crate::config::SmtpSettings;
    use crate::error::NotificationError;

    /// Plain-text mail over a blocking SMTP transport
    pub struct SmtpNotificationSink {
        transport: SmtpTransport,
        from: Mailbox,
    }

    impl SmtpNotificationSink {
        pub fn new(config: &SmtpSettings) -> Result<Self, NotificationError> {
            let from: Mailbox = config
                .from_address
                .parse()
                .map_err(|e| NotificationError::Address(format!("{e}")))?;

            let builder = if config.use_tls {
                SmtpTransport::starttls_relay(&config.host)
                    .map_err(|e| NotificationError::Config(format!("{e}")))?
            } else {
                SmtpTransport::builder_dangerous(&config.host)
            };
            let mut builder = builder.port(config.port);
            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }

            debug!(host = %config.host, port = config.port, "SMTP sink initialized");
            Ok(Self {
                transport: builder.build(),
                from,
            })
        }
    }

    impl NotificationSink for SmtpNotificationSink {
        fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| NotificationError::Address(format!("{e}")))?;
            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_owned())
                .map_err(|e| NotificationError::Send(format!("{e}")))?;
            self.transport
                .send(&message)
                .map_err(|e| NotificationError::Send(format!("{e}")))?;
            Ok(())
        }
    }
}

#[cfg(feature = "smtp")]
pub use smtp::SmtpNotificationSink;
