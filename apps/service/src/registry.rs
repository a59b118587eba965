//! Load-time construction of monitor definitions and alert rules.
//!
//! Built once from a parsed [`Config`]. A broken entry only degrades
//! itself: an unparseable interval falls back to the default, an alert
//! that can't be delivered is kept as [`AlertEntry::Inactive`].

use regex::Regex;
use std::collections::HashSet;
use std::env;
use tracing::{debug, warn};

use crate::alerting::email::{parse_recipients, resolve_sender};
use crate::alerting::{AlertEntry, AlertRule, Attribute, EmailSpec, NotifierKind, NotifierSpec};
use crate::config::{AlertConfig, Config, EmailSettings, ScanConfig};
use crate::monitoring::types::{CheckKind, MonitorDefinition, StoreKey};
use crate::monitoring::validation::{interval_or_default, validate_monitor_target};

/// Everything the scheduler runs, as loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub monitors: Vec<MonitorDefinition>,
    pub alerts: Vec<AlertEntry>,
}

impl Registry {
    /// Build from config, resolving notifier identities from the process
    /// environment
    pub fn from_config(config: &Config) -> Self {
        Self::build(config, |name| env::var(name).ok())
    }

    /// Build from config with an explicit environment lookup
    pub fn build(config: &Config, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let monitors = load_monitors(&config.scans);

        debug!("Configuring alerts");
        let alerts: Vec<AlertEntry> = config
            .alerts
            .iter()
            .map(|alert| load_alert(alert, &monitors, &config.email, &lookup))
            .collect();

        if alerts.is_empty() {
            debug!("No alerts loaded");
        }
        debug!(
            monitors = monitors.len(),
            alerts = alerts.len(),
            active_alerts = alerts.iter().filter(|a| a.is_active()).count(),
            "Daemon configuration loaded"
        );

        Self { monitors, alerts }
    }
}

/// One definition per (scan, target) pair; duplicates and unknown kinds are
/// dropped with a warning
fn load_monitors(scans: &[ScanConfig]) -> Vec<MonitorDefinition> {
    let mut seen = HashSet::new();
    let mut monitors = Vec::new();

    for scan in scans {
        debug!(scan = %scan.name, "Loading scan");

        let kind: CheckKind = match scan.kind.parse() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(scan = %scan.name, error = %e, "Skipping scan with unsupported type");
                continue;
            }
        };

        if scan.targets.is_empty() {
            warn!(scan = %scan.name, "Scan has no targets");
        }

        let interval = interval_or_default(&scan.name, scan.every.as_deref());

        for target in &scan.targets {
            if let Err(e) = validate_monitor_target(target, kind) {
                warn!(scan = %scan.name, target = %target, error = %e, "Suspicious target, every run is likely to fail");
            }

            let monitor = MonitorDefinition::new(scan.name.clone(), target.clone(), kind, interval);
            if !seen.insert(monitor.key()) {
                warn!(monitor = %monitor.key(), "Duplicate scan target, ignoring");
                continue;
            }
            monitors.push(monitor);
        }
    }

    monitors
}

fn load_alert(
    alert: &AlertConfig,
    monitors: &[MonitorDefinition],
    email: &EmailSettings,
    lookup: &impl Fn(&str) -> Option<String>,
) -> AlertEntry {
    debug!(alert = %alert.name, "Loading alert");

    let inactive = |reason: String| {
        warn!(alert = %alert.name, reason = %reason, "Alert loaded as inactive");
        AlertEntry::Inactive { name: alert.name.clone(), reason }
    };

    let kind: NotifierKind = match alert.kind.parse() {
        Ok(kind) => kind,
        Err(e) => return inactive(e),
    };

    let pattern = match Regex::new(&alert.regex) {
        Ok(pattern) => pattern,
        Err(e) => return inactive(format!("invalid regex: {e}")),
    };

    let attribute = match alert.attribute.as_deref().map(str::parse::<Attribute>) {
        None => Attribute::default(),
        Some(Ok(attribute)) => attribute,
        Some(Err(e)) => {
            warn!(alert = %alert.name, error = %e, "Falling back to the output attribute");
            Attribute::default()
        }
    };

    let keys = resolve_keys(alert, monitors);
    if keys.is_empty() {
        return inactive("no targets configured".to_string());
    }

    let notifier = match kind {
        NotifierKind::Log => NotifierSpec::Log,
        NotifierKind::Email => {
            let Some(from) = resolve_sender(email, lookup) else {
                return inactive("sender identity unresolved, set email.sender_name/sender_email or SENDGRID_SENDER_NAME/SENDGRID_SENDER_EMAIL".to_string());
            };

            let (to, rejected) = parse_recipients(alert.send_to.as_deref().unwrap_or_default());
            for entry in &rejected {
                warn!(alert = %alert.name, entry = %entry, "Failed to parse recipient");
            }
            if to.is_empty() {
                return inactive("no valid recipient in send_to".to_string());
            }

            NotifierSpec::Email(EmailSpec {
                from,
                to,
                subject: alert.subject.clone(),
                message: alert.message.clone(),
            })
        }
    };

    AlertEntry::Active(AlertRule { name: alert.name.clone(), pattern, attribute, keys, notifier })
}

/// Map the alert's targets to store keys. With `scan` set each target maps
/// to that scan's key, otherwise to every monitor checking that target.
fn resolve_keys(alert: &AlertConfig, monitors: &[MonitorDefinition]) -> Vec<StoreKey> {
    let mut keys: Vec<StoreKey> = Vec::new();

    for target in &alert.targets {
        let matching: Vec<StoreKey> = monitors
            .iter()
            .filter(|m| &m.target == target)
            .filter(|m| alert.scan.as_ref().is_none_or(|scan| &m.name == scan))
            .map(MonitorDefinition::key)
            .collect();

        if matching.is_empty() {
            warn!(alert = %alert.name, target = %target, "No scan checks this target, the alert will never find results");
            // Kept so the miss shows up on every tick
            keys.push(StoreKey::new(alert.scan.clone().unwrap_or_default(), target.clone()));
            continue;
        }

        for key in matching {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    keys
}
