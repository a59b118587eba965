use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::NotifyError;
use super::rule::AlertRule;
use crate::monitoring::types::CheckResult;

/// Transport used to deliver an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifierKind {
    Email,
    Log,
}

impl fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifierKind::Email => write!(f, "email"),
            NotifierKind::Log => write!(f, "log"),
        }
    }
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" | "sendgrid" => Ok(NotifierKind::Email),
            "log" => Ok(NotifierKind::Log),
            other => Err(format!("unknown alert type: {other}")),
        }
    }
}

/// Outcome of one delivery attempt
#[derive(Debug, Default)]
pub struct Delivery {
    /// Human readable summary of what was sent
    pub output: String,
    pub errors: Vec<NotifyError>,
}

impl Delivery {
    pub fn failed(error: NotifyError) -> Self {
        Self { output: String::new(), errors: vec![error] }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Trait for delivering alerts
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `rule`'s notification about `result`. Misconfiguration is
    /// reported through [`Delivery::errors`], never by panicking.
    async fn send(&self, rule: &AlertRule, result: &CheckResult) -> Delivery;
}

/// Notifier that only writes the alert to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, rule: &AlertRule, result: &CheckResult) -> Delivery {
        tracing::warn!(
            alert = %rule.name,
            monitor = %result.key,
            status = %result.status,
            "[ALERT]"
        );
        Delivery { output: format!("Alert {} logged for {}", rule.name, result.key), errors: Vec::new() }
    }
}

/// Notifiers bound by kind
#[derive(Default, Clone)]
pub struct Notifiers {
    notifiers: HashMap<NotifierKind, Arc<dyn Notifier>>,
}

impl Notifiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a notifier to a kind, replacing any previous binding
    pub fn register(&mut self, kind: NotifierKind, notifier: Arc<dyn Notifier>) {
        self.notifiers.insert(kind, notifier);
    }

    pub fn with(mut self, kind: NotifierKind, notifier: Arc<dyn Notifier>) -> Self {
        self.register(kind, notifier);
        self
    }

    pub fn get(&self, kind: NotifierKind) -> Option<Arc<dyn Notifier>> {
        self.notifiers.get(&kind).cloned()
    }
}
