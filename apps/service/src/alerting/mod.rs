//! Alerting - matches stored results against configured patterns
//!
//! An [`AlertRule`] pairs a regex with the monitor keys it watches and the
//! addressing for its notifier. Notifiers are looked up by
//! [`NotifierKind`] when an alert fires.

pub mod email;
pub mod notifier;
pub mod rule;

pub use email::EmailNotifier;
pub use notifier::{Delivery, LogNotifier, Notifier, NotifierKind, Notifiers};
pub use rule::{AlertEntry, AlertRule, Attribute, EmailSpec, Mailbox, NotifierSpec};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("SENDGRID_API_KEY not defined, can't send email alert")]
    MissingApiKey,

    #[error("Notifier misconfigured: {0}")]
    Misconfigured(String),

    #[error("No notifier registered for {0} alerts")]
    Unavailable(NotifierKind),

    #[error("Delivery failed: {0}")]
    Transport(String),

    #[error("Delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Delivery timed out after {0}s")]
    Timeout(u64),
}
