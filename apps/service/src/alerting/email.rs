//! Email alerts delivered through the SendGrid v3 API.

use serde_json::{Value, json};
use std::env;
use std::time::Duration;

use super::NotifyError;
use super::notifier::{Delivery, Notifier};
use super::rule::{AlertRule, EmailSpec, Mailbox, NotifierSpec};
use crate::config::EmailSettings;
use crate::monitoring::types::CheckResult;

pub const SENDGRID_API_KEY: &str = "SENDGRID_API_KEY";
pub const SENDGRID_SENDER_NAME: &str = "SENDGRID_SENDER_NAME";
pub const SENDGRID_SENDER_EMAIL: &str = "SENDGRID_SENDER_EMAIL";

const DEFAULT_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Sender identity from the config file, falling back to the environment.
/// `None` when either the name or the address is missing.
pub fn resolve_sender(settings: &EmailSettings, lookup: impl Fn(&str) -> Option<String>) -> Option<Mailbox> {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let name = non_empty(settings.sender_name.clone()).or_else(|| non_empty(lookup(SENDGRID_SENDER_NAME)))?;
    let email =
        non_empty(settings.sender_email.clone()).or_else(|| non_empty(lookup(SENDGRID_SENDER_EMAIL)))?;

    Some(Mailbox::new(name.trim(), email.trim()))
}

/// Parse `"Jane Doe jane@example.com, Ops <ops@example.com>"`.
///
/// Returns the recipients that parsed and the raw entries that didn't.
pub fn parse_recipients(send_to: &str) -> (Vec<Mailbox>, Vec<String>) {
    let mut recipients = Vec::new();
    let mut rejected = Vec::new();

    for entry in send_to.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match parse_mailbox(entry) {
            Some(mailbox) => recipients.push(mailbox),
            None => rejected.push(entry.to_string()),
        }
    }

    (recipients, rejected)
}

fn parse_mailbox(entry: &str) -> Option<Mailbox> {
    if let Some((name, rest)) = entry.split_once('<') {
        let email = rest.strip_suffix('>')?.trim();
        return is_address(email).then(|| Mailbox::new(name.trim(), email));
    }

    let mut words: Vec<&str> = entry.split_whitespace().collect();
    let email = words.pop()?;
    is_address(email).then(|| Mailbox::new(words.join(" "), email))
}

fn is_address(candidate: &str) -> bool {
    match candidate.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !candidate.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Sends one SendGrid message per recipient
pub struct EmailNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl EmailNotifier {
    pub fn new(api_key: Option<String>, api_url: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    /// API key from `SENDGRID_API_KEY`, endpoint from the config file
    pub fn from_env(settings: &EmailSettings, timeout: Duration) -> anyhow::Result<Self> {
        Self::new(env::var(SENDGRID_API_KEY).ok(), settings.api_url.clone(), timeout)
    }

    fn payload(spec: &EmailSpec, to: &Mailbox, subject: &str, message: &str) -> Value {
        json!({
            "personalizations": [{ "to": [{ "email": to.email, "name": to.name }] }],
            "from": { "email": spec.from.email, "name": spec.from.name },
            "subject": subject,
            "content": [
                { "type": "text/plain", "value": message },
                { "type": "text/html", "value": message },
            ],
        })
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, rule: &AlertRule, result: &CheckResult) -> Delivery {
        let NotifierSpec::Email(spec) = &rule.notifier else {
            return Delivery::failed(NotifyError::Misconfigured(format!(
                "alert {} has no email addressing",
                rule.name
            )));
        };
        let Some(api_key) = &self.api_key else {
            return Delivery::failed(NotifyError::MissingApiKey);
        };
        if spec.to.is_empty() {
            return Delivery::failed(NotifyError::Misconfigured(format!(
                "alert {} has no recipients",
                rule.name
            )));
        }

        let subject = rule.render(&spec.subject, result);
        let message = rule.render(&spec.message, result);
        let mut delivery = Delivery::default();

        for to in &spec.to {
            let response = self
                .client
                .post(&self.api_url)
                .bearer_auth(api_key)
                .json(&Self::payload(spec, to, &subject, &message))
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    delivery.output.push_str(&format!(
                        "Alert sent: {} to {}\tStatus: {}\n",
                        subject,
                        to,
                        response.status().as_u16()
                    ));
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    delivery.errors.push(NotifyError::Rejected { status, body });
                }
                Err(e) => delivery.errors.push(NotifyError::Transport(e.to_string())),
            }
        }

        delivery
    }
}
