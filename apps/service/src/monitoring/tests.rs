//! Tests for the scan-then-alert tick cycle
//!
//! Checkers and notifiers are replaced by recording fakes so no test
//! touches the network or spawns processes.

use anyhow::{Result, anyhow};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::alerting::{
    AlertEntry, AlertRule, Attribute, Delivery, Notifier, NotifierKind, NotifierSpec, Notifiers,
    NotifyError,
};
use crate::monitoring::checker::{Checker, ScanOutput};
use crate::monitoring::{
    CheckKind, CheckResult, MonitorDefinition, MonitoringExecutor, Scheduler, SchedulerOptions,
    StoreKey,
};
use crate::registry::Registry;
use crate::storage::InMemoryStore;

/// Checker returning canned payloads and recording every call
#[derive(Clone, Default)]
struct RecordingChecker {
    calls: Arc<Mutex<Vec<String>>>,
    failing: Vec<String>,
    payloads: HashMap<String, String>,
}

impl RecordingChecker {
    fn failing_on(mut self, target: &str) -> Self {
        self.failing.push(target.to_string());
        self
    }

    fn with_payload(mut self, target: &str, payload: &str) -> Self {
        self.payloads.insert(target.to_string(), payload.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Checker for RecordingChecker {
    async fn check(&self, target: &str) -> Result<ScanOutput> {
        self.calls.lock().unwrap().push(target.to_string());
        if self.failing.iter().any(|t| t == target) {
            return Err(anyhow!("connection refused"));
        }
        let payload = self.payloads.get(target).cloned().unwrap_or_else(|| "ok".to_string());
        Ok(ScanOutput { payload, status_code: Some(200), error: None })
    }
}

/// Notifier recording (alert, target) pairs, optionally failing
#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail_for: Option<String>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, rule: &AlertRule, result: &CheckResult) -> Delivery {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push((rule.name.clone(), result.key.target.clone()));
        if self.fail_for.as_deref() == Some(rule.name.as_str()) {
            return Delivery::failed(NotifyError::Transport("smtp unreachable".to_string()));
        }
        Delivery { output: format!("sent {}", rule.name), errors: Vec::new() }
    }
}

fn monitor(name: &str, target: &str) -> MonitorDefinition {
    MonitorDefinition::new(name, target, CheckKind::Html, Duration::from_secs(3600))
}

fn log_rule(name: &str, pattern: &str, keys: Vec<StoreKey>) -> AlertEntry {
    AlertEntry::Active(AlertRule {
        name: name.to_string(),
        pattern: Regex::new(pattern).unwrap(),
        attribute: Attribute::Output,
        keys,
        notifier: NotifierSpec::Log,
    })
}

fn scheduler(
    monitors: Vec<MonitorDefinition>,
    alerts: Vec<AlertEntry>,
    checker: &RecordingChecker,
    notifier: &RecordingNotifier,
    options: SchedulerOptions,
) -> Scheduler {
    let mut executor = MonitoringExecutor::empty(Duration::from_secs(5));
    executor.register(CheckKind::Html, Arc::new(checker.clone()));
    let notifiers = Notifiers::new().with(NotifierKind::Log, Arc::new(notifier.clone()));

    Scheduler::new(
        Registry { monitors, alerts },
        Arc::new(executor),
        notifiers,
        Box::new(InMemoryStore::new(10)),
        options,
    )
}

#[tokio::test]
async fn test_first_tick_runs_everything_then_waits_for_interval() {
    let checker = RecordingChecker::default();
    let notifier = RecordingNotifier::default();
    let mut scheduler = scheduler(
        vec![monitor("site", "https://a.example"), monitor("site", "https://b.example")],
        Vec::new(),
        &checker,
        &notifier,
        SchedulerOptions::default(),
    );

    let report = scheduler.tick(SystemTime::now()).await;
    assert_eq!(report.scanned, 2);

    // Nothing is due again until the hour has passed
    let report = scheduler.tick(SystemTime::now()).await;
    assert_eq!(report.scanned, 0);
    assert_eq!(checker.calls().len(), 2);

    let later = SystemTime::now() + Duration::from_secs(3601);
    let report = scheduler.tick(later).await;
    assert_eq!(report.scanned, 2);

    let key = StoreKey::new("site", "https://a.example");
    assert_eq!(scheduler.store().count_for(&key), 2);
}

#[tokio::test]
async fn test_scan_failure_is_isolated_and_stored() {
    let checker = RecordingChecker::default().failing_on("https://a.example");
    let notifier = RecordingNotifier::default();
    let key_b = StoreKey::new("site", "https://b.example");
    let mut scheduler = scheduler(
        vec![monitor("site", "https://a.example"), monitor("site", "https://b.example")],
        vec![log_rule("b is ok", "ok", vec![key_b.clone()])],
        &checker,
        &notifier,
        SchedulerOptions::default(),
    );

    let report = scheduler.tick(SystemTime::now()).await;

    assert_eq!(report.scanned, 2);
    assert_eq!(report.failed_scans, 1);
    assert_eq!(report.alerts_matched, 1);
    assert_eq!(checker.calls(), vec!["https://a.example", "https://b.example"]);

    let failed = scheduler.store().latest(&StoreKey::new("site", "https://a.example")).unwrap();
    assert!(failed.is_failure());
    assert_eq!(failed.error_message.as_deref(), Some("connection refused"));
    assert_eq!(scheduler.store().latest(&key_b).unwrap().payload, "ok");
    assert_eq!(notifier.sent(), vec![("b is ok".to_string(), "https://b.example".to_string())]);
}

#[tokio::test]
async fn test_alert_dispatch_only_on_match() {
    let checker = RecordingChecker::default()
        .with_payload("https://a.example", "<h1>503 Service Unavailable</h1>")
        .with_payload("https://b.example", "<h1>Welcome</h1>");
    let notifier = RecordingNotifier::default();
    let mut scheduler = scheduler(
        vec![monitor("site", "https://a.example"), monitor("site", "https://b.example")],
        vec![log_rule(
            "outage",
            "Unavailable",
            vec![StoreKey::new("site", "https://a.example"), StoreKey::new("site", "https://b.example")],
        )],
        &checker,
        &notifier,
        SchedulerOptions::default(),
    );

    let report = scheduler.tick(SystemTime::now()).await;

    assert_eq!(report.alerts_evaluated, 1);
    assert_eq!(report.alerts_matched, 1);
    assert_eq!(notifier.sent(), vec![("outage".to_string(), "https://a.example".to_string())]);

    // Same stored result, same verdict on the next tick
    let report = scheduler.tick(SystemTime::now()).await;
    assert_eq!(report.scanned, 0);
    assert_eq!(report.alerts_matched, 1);
    assert_eq!(notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_missing_history_is_skipped() {
    let checker = RecordingChecker::default();
    let notifier = RecordingNotifier::default();
    let mut scheduler = scheduler(
        vec![monitor("site", "https://a.example")],
        vec![log_rule(
            "anything",
            ".",
            vec![StoreKey::new("", "https://nowhere.example"), StoreKey::new("site", "https://a.example")],
        )],
        &checker,
        &notifier,
        SchedulerOptions::default(),
    );

    let report = scheduler.tick(SystemTime::now()).await;

    assert_eq!(report.lookup_misses, 1);
    assert_eq!(report.alerts_matched, 1);
    assert_eq!(notifier.sent(), vec![("anything".to_string(), "https://a.example".to_string())]);
}

#[tokio::test]
async fn test_inactive_alerts_are_never_evaluated() {
    let checker = RecordingChecker::default();
    let notifier = RecordingNotifier::default();
    let mut scheduler = scheduler(
        vec![monitor("site", "https://a.example")],
        vec![
            AlertEntry::Inactive { name: "no sender".to_string(), reason: "missing sender".to_string() },
            log_rule("active", ".", vec![StoreKey::new("site", "https://a.example")]),
        ],
        &checker,
        &notifier,
        SchedulerOptions::default(),
    );

    let report = scheduler.tick(SystemTime::now()).await;

    assert_eq!(report.inactive_alerts, 1);
    assert_eq!(report.alerts_evaluated, 1);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_delivery_failure_does_not_block_other_alerts() {
    let checker = RecordingChecker::default();
    let notifier = RecordingNotifier { fail_for: Some("first".to_string()), ..Default::default() };
    let key = StoreKey::new("site", "https://a.example");
    let mut scheduler = scheduler(
        vec![monitor("site", "https://a.example")],
        vec![log_rule("first", ".", vec![key.clone()]), log_rule("second", ".", vec![key])],
        &checker,
        &notifier,
        SchedulerOptions::default(),
    );

    let report = scheduler.tick(SystemTime::now()).await;

    assert_eq!(report.alerts_matched, 2);
    assert_eq!(report.delivery_errors, 1);
    assert_eq!(notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_unregistered_notifier_is_a_delivery_error() {
    let checker = RecordingChecker::default();
    let notifier = RecordingNotifier::default();
    let key = StoreKey::new("site", "https://a.example");
    let email_rule = AlertEntry::Active(AlertRule {
        name: "email".to_string(),
        pattern: Regex::new(".").unwrap(),
        attribute: Attribute::Output,
        keys: vec![key],
        notifier: NotifierSpec::Email(crate::alerting::EmailSpec {
            from: crate::alerting::Mailbox::new("Telescope", "telescope@example.com"),
            to: vec![crate::alerting::Mailbox::new("Jane", "jane@example.com")],
            subject: String::new(),
            message: String::new(),
        }),
    });
    let mut scheduler = scheduler(
        vec![monitor("site", "https://a.example")],
        vec![email_rule],
        &checker,
        &notifier,
        SchedulerOptions::default(),
    );

    let report = scheduler.tick(SystemTime::now()).await;

    assert_eq!(report.alerts_matched, 1);
    assert_eq!(report.delivery_errors, 1);
    assert!(notifier.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hung_notifier_times_out() {
    let checker = RecordingChecker::default();
    let notifier = RecordingNotifier { delay: Some(Duration::from_secs(600)), ..Default::default() };
    let mut scheduler = scheduler(
        vec![monitor("site", "https://a.example")],
        vec![log_rule("slow", ".", vec![StoreKey::new("site", "https://a.example")])],
        &checker,
        &notifier,
        SchedulerOptions { notify_timeout: Duration::from_secs(1), ..SchedulerOptions::default() },
    );

    let report = scheduler.tick(SystemTime::now()).await;

    assert_eq!(report.alerts_matched, 1);
    assert_eq!(report.delivery_errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_multi_recipient_send_keeps_its_delivery() {
    let checker = RecordingChecker::default();
    let notifier = RecordingNotifier { delay: Some(Duration::from_millis(1500)), ..Default::default() };
    let key = StoreKey::new("site", "https://a.example");
    let email_rule = AlertEntry::Active(AlertRule {
        name: "team".to_string(),
        pattern: Regex::new(".").unwrap(),
        attribute: Attribute::Output,
        keys: vec![key],
        notifier: NotifierSpec::Email(crate::alerting::EmailSpec {
            from: crate::alerting::Mailbox::new("Telescope", "telescope@example.com"),
            to: vec![
                crate::alerting::Mailbox::new("Jane", "jane@example.com"),
                crate::alerting::Mailbox::new("Ops", "ops@example.com"),
            ],
            subject: String::new(),
            message: String::new(),
        }),
    });
    let mut executor = MonitoringExecutor::empty(Duration::from_secs(5));
    executor.register(CheckKind::Html, Arc::new(checker.clone()));
    let mut scheduler = Scheduler::new(
        Registry { monitors: vec![monitor("site", "https://a.example")], alerts: vec![email_rule] },
        Arc::new(executor),
        Notifiers::new().with(NotifierKind::Email, Arc::new(notifier.clone())),
        Box::new(InMemoryStore::new(10)),
        SchedulerOptions { notify_timeout: Duration::from_secs(1), ..SchedulerOptions::default() },
    );

    // Longer than one request's bound, within the budget for two recipients
    let report = scheduler.tick(SystemTime::now()).await;

    assert_eq!(report.alerts_matched, 1);
    assert_eq!(report.delivery_errors, 0);
    assert_eq!(notifier.sent(), vec![("team".to_string(), "https://a.example".to_string())]);
}

#[tokio::test]
async fn test_concurrent_scans_store_every_result() {
    let checker = RecordingChecker::default().failing_on("https://c.example");
    let notifier = RecordingNotifier::default();
    let monitors: Vec<MonitorDefinition> =
        ["a", "b", "c", "d", "e"].iter().map(|t| monitor("site", &format!("https://{t}.example"))).collect();
    let keys: Vec<StoreKey> = monitors.iter().map(MonitorDefinition::key).collect();
    let mut scheduler = scheduler(
        monitors,
        Vec::new(),
        &checker,
        &notifier,
        SchedulerOptions { max_concurrent_scans: 3, ..SchedulerOptions::default() },
    );

    let report = scheduler.tick(SystemTime::now()).await;

    assert_eq!(report.scanned, 5);
    assert_eq!(report.failed_scans, 1);
    assert_eq!(checker.calls().len(), 5);
    for key in &keys {
        assert_eq!(scheduler.store().count_for(key), 1);
    }
}

#[tokio::test]
async fn test_history_stays_bounded_across_ticks() {
    let checker = RecordingChecker::default();
    let notifier = RecordingNotifier::default();
    let every_tick = MonitorDefinition::new("site", "https://a.example", CheckKind::Html, Duration::ZERO);
    let key = every_tick.key();
    let mut scheduler = scheduler(vec![every_tick], Vec::new(), &checker, &notifier, SchedulerOptions::default());

    for i in 1..=15u64 {
        scheduler.tick(SystemTime::now() + Duration::from_secs(i)).await;
    }

    assert_eq!(checker.calls().len(), 15);
    assert_eq!(scheduler.store().count_for(&key), 10);
}

#[test]
fn test_is_eligible_reads_store() {
    let checker = RecordingChecker::default();
    let notifier = RecordingNotifier::default();
    let definition = monitor("site", "https://a.example");
    let scheduler =
        scheduler(vec![definition.clone()], Vec::new(), &checker, &notifier, SchedulerOptions::default());

    // No history yet, so eligible regardless of the interval
    assert!(scheduler.is_eligible(&definition, SystemTime::now()));
}
