use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use super::notifier::NotifierKind;
use crate::monitoring::types::{CheckResult, StoreKey};

/// Which piece of a result an alert pattern is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Attribute {
    /// Page body or scanner stdout
    #[default]
    Output,
    /// Failure text, empty when the check succeeded
    Error,
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "output" | "payload" | "html" | "stdout" | "body" => Ok(Attribute::Output),
            "error" | "stderr" | "failure" => Ok(Attribute::Error),
            other => Err(format!("unknown attribute: {other}")),
        }
    }
}

impl Attribute {
    pub fn select<'a>(&self, result: &'a CheckResult) -> &'a str {
        match self {
            Attribute::Output => &result.payload,
            Attribute::Error => result.error_message.as_deref().unwrap_or_default(),
        }
    }
}

/// A display name plus address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: String,
    pub email: String,
}

impl Mailbox {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into() }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// Addressing for an email alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSpec {
    pub from: Mailbox,
    pub to: Vec<Mailbox>,
    pub subject: String,
    pub message: String,
}

/// Notifier specific part of an alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierSpec {
    Email(EmailSpec),
    Log,
}

impl NotifierSpec {
    pub fn kind(&self) -> NotifierKind {
        match self {
            NotifierSpec::Email(_) => NotifierKind::Email,
            NotifierSpec::Log => NotifierKind::Log,
        }
    }

    /// Number of outbound requests one send makes
    pub fn deliveries(&self) -> u32 {
        match self {
            NotifierSpec::Email(spec) => u32::try_from(spec.to.len()).unwrap_or(u32::MAX).max(1),
            NotifierSpec::Log => 1,
        }
    }
}

/// A validated alert: pattern, where to look, and who to tell
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub name: String,
    pub pattern: Regex,
    pub attribute: Attribute,
    /// Monitors whose latest result is evaluated
    pub keys: Vec<StoreKey>,
    pub notifier: NotifierSpec,
}

impl AlertRule {
    /// Whether the rule fires for `result`. Pure: same inputs, same verdict.
    pub fn evaluate(&self, result: &CheckResult) -> bool {
        self.pattern.is_match(self.attribute.select(result))
    }

    /// Substitute `{alert}`, `{target}`, `{name}`, `{status}`, `{error}` and
    /// `{timestamp}` in a subject or message template
    pub fn render(&self, template: &str, result: &CheckResult) -> String {
        let timestamp: DateTime<Utc> = result.timestamp.into();
        template
            .replace("{alert}", &self.name)
            .replace("{target}", &result.key.target)
            .replace("{name}", &result.key.name)
            .replace("{status}", &result.status.to_string())
            .replace("{error}", result.error_message.as_deref().unwrap_or_default())
            .replace("{timestamp}", &timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

/// Registry entry for a configured alert
#[derive(Debug, Clone)]
pub enum AlertEntry {
    Active(AlertRule),
    /// Kept so operators can see it, never evaluated
    Inactive { name: String, reason: String },
}

impl AlertEntry {
    pub fn name(&self) -> &str {
        match self {
            AlertEntry::Active(rule) => &rule.name,
            AlertEntry::Inactive { name, .. } => name,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AlertEntry::Active(_))
    }

    pub fn as_active(&self) -> Option<&AlertRule> {
        match self {
            AlertEntry::Active(rule) => Some(rule),
            AlertEntry::Inactive { .. } => None,
        }
    }
}
