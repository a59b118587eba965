use anyhow::Result;
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, error, info, warn};

use super::executor::MonitoringExecutor;
use super::types::{CheckResult, MonitorDefinition};
use crate::alerting::{
    AlertEntry, AlertRule, Delivery, EmailNotifier, LogNotifier, NotifierKind, Notifiers,
    NotifyError,
};
use crate::config::Config;
use crate::registry::Registry;
use crate::storage::{InMemoryStore, ResultStore};

/// Runtime knobs of the tick loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Wall-clock period between ticks
    pub tick: Duration,
    /// Upper bound on each outbound request of a notifier call
    pub notify_timeout: Duration,
    /// 1 runs eligible scans one after another
    pub max_concurrent_scans: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            notify_timeout: Duration::from_secs(30),
            max_concurrent_scans: 1,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub scanned: usize,
    pub failed_scans: usize,
    pub alerts_evaluated: usize,
    pub inactive_alerts: usize,
    pub alerts_matched: usize,
    /// Alert targets without any stored result
    pub lookup_misses: usize,
    pub delivery_errors: usize,
}

/// Monitoring scheduler - decides what runs each tick, stores the results
/// and evaluates alerts against them
pub struct Scheduler {
    monitors: Vec<MonitorDefinition>,
    alerts: Vec<AlertEntry>,
    executor: Arc<MonitoringExecutor>,
    notifiers: Notifiers,
    store: Box<dyn ResultStore>,
    options: SchedulerOptions,
}

impl Scheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        registry: Registry,
        executor: Arc<MonitoringExecutor>,
        notifiers: Notifiers,
        store: Box<dyn ResultStore>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            monitors: registry.monitors,
            alerts: registry.alerts,
            executor,
            notifiers,
            store,
            options: SchedulerOptions {
                max_concurrent_scans: options.max_concurrent_scans.max(1),
                ..options
            },
        }
    }

    /// Build the registry, the built-in checkers and notifiers from config
    pub fn from_config(config: &Config) -> Result<Self> {
        let preferences = config.preferences.normalized();
        let notify_timeout = Duration::from_secs(preferences.notify_timeout_seconds);

        let executor = Arc::new(MonitoringExecutor::new(Duration::from_secs(
            preferences.scan_timeout_seconds,
        ))?);
        let notifiers = Notifiers::new()
            .with(
                NotifierKind::Email,
                Arc::new(EmailNotifier::from_env(&config.email, notify_timeout)?),
            )
            .with(NotifierKind::Log, Arc::new(LogNotifier));

        Ok(Self::new(
            Registry::from_config(config),
            executor,
            notifiers,
            Box::new(InMemoryStore::new(preferences.cache_length)),
            SchedulerOptions {
                tick: Duration::from_secs(preferences.tick_seconds),
                notify_timeout,
                max_concurrent_scans: preferences.max_concurrent_scans,
            },
        ))
    }

    pub fn monitors(&self) -> &[MonitorDefinition] {
        &self.monitors
    }

    pub fn alerts(&self) -> &[AlertEntry] {
        &self.alerts
    }

    pub fn store(&self) -> &dyn ResultStore {
        self.store.as_ref()
    }

    /// Whether `monitor` may run at `now` given its stored history
    pub fn is_eligible(&self, monitor: &MonitorDefinition, now: SystemTime) -> bool {
        let key = monitor.key();
        let last_run = if self.store.count_for(&key) == 0 {
            None
        } else {
            self.store.latest(&key).ok().map(|result| result.timestamp)
        };
        monitor.is_eligible(last_run, now)
    }

    /// Run the tick loop forever. Ticks never overlap: a slow tick delays
    /// the next one instead of queueing a burst.
    pub async fn run(&mut self) {
        info!(
            monitors = self.monitors().len(),
            alerts = self.alerts().len(),
            tick_seconds = self.options.tick.as_secs(),
            "Daemon started"
        );

        let mut timer = interval(self.options.tick);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            let report = self.tick(SystemTime::now()).await;
            info!(
                scanned = report.scanned,
                failed = report.failed_scans,
                matched = report.alerts_matched,
                misses = report.lookup_misses,
                delivery_errors = report.delivery_errors,
                stored_keys = self.store.key_count(),
                "Tick completed"
            );
        }
    }

    /// One scan phase followed by one alert phase
    pub async fn tick(&mut self, now: SystemTime) -> TickReport {
        let mut report = TickReport::default();
        self.scan_phase(now, &mut report).await;
        self.alert_phase(&mut report).await;
        report
    }

    async fn scan_phase(&mut self, now: SystemTime, report: &mut TickReport) {
        debug!("Evaluating scans");

        let eligible: Vec<usize> = (0..self.monitors.len())
            .filter(|&i| self.is_eligible(&self.monitors[i], now))
            .collect();

        let Self { monitors, executor, store, options, .. } = self;
        let monitors: &[MonitorDefinition] = monitors;
        let executor: &MonitoringExecutor = executor;

        if options.max_concurrent_scans <= 1 {
            for &i in &eligible {
                let monitor = &monitors[i];
                debug!(monitor = %monitor.key(), "Eligible for run, scanning now");
                let result = executor.execute_check(monitor).await;
                record(store.as_mut(), result, report);
            }
            return;
        }

        // Each key appears once per tick, so per-key runs stay sequential
        let mut results = stream::iter(eligible.iter().map(move |&i| &monitors[i]))
            .map(move |monitor| {
                debug!(monitor = %monitor.key(), "Eligible for run, scanning now");
                executor.execute_check(monitor)
            })
            .buffer_unordered(options.max_concurrent_scans);

        while let Some(result) = results.next().await {
            record(store.as_mut(), result, report);
        }
    }

    async fn alert_phase(&self, report: &mut TickReport) {
        if self.alerts.is_empty() {
            debug!("No alerts loaded");
            return;
        }
        debug!("Evaluating alerts");

        for entry in &self.alerts {
            let rule = match entry {
                AlertEntry::Active(rule) => rule,
                AlertEntry::Inactive { name, .. } => {
                    debug!(alert = %name, "Skipping inactive alert");
                    report.inactive_alerts += 1;
                    continue;
                }
            };
            report.alerts_evaluated += 1;

            for key in &rule.keys {
                let result = match self.store.latest(key) {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(alert = %rule.name, error = %e, "Failed to get the last scan");
                        report.lookup_misses += 1;
                        continue;
                    }
                };

                if !rule.evaluate(result) {
                    debug!(alert = %rule.name, monitor = %key, "No match");
                    continue;
                }

                info!(alert = %rule.name, monitor = %key, "Alert matched");
                report.alerts_matched += 1;

                let delivery = self.dispatch(rule, result).await;
                for err in &delivery.errors {
                    error!(alert = %rule.name, monitor = %key, error = %err, "Alert failed to send");
                }
                report.delivery_errors += delivery.errors.len();
                if !delivery.output.is_empty() {
                    debug!(alert = %rule.name, output = %delivery.output.trim_end(), "Alert delivered");
                }
            }
        }
    }

    async fn dispatch(&self, rule: &AlertRule, result: &CheckResult) -> Delivery {
        let kind = rule.notifier.kind();
        let Some(notifier) = self.notifiers.get(kind) else {
            return Delivery::failed(NotifyError::Unavailable(kind));
        };

        // The notifier bounds each request itself, this only catches a hang
        let budget = self.options.notify_timeout.saturating_mul(rule.notifier.deliveries() + 1);
        match timeout(budget, notifier.send(rule, result)).await {
            Ok(delivery) => delivery,
            Err(_) => Delivery::failed(NotifyError::Timeout(budget.as_secs())),
        }
    }
}

fn record(store: &mut dyn ResultStore, result: CheckResult, report: &mut TickReport) {
    report.scanned += 1;
    if let Some(error) = &result.error_message {
        report.failed_scans += 1;
        warn!(monitor = %result.key, error = %error, "Scan failed");
    } else {
        debug!(
            monitor = %result.key,
            status = %result.status,
            latency_ms = ?result.latency_ms,
            bytes = result.payload.len(),
            "Scan completed"
        );
    }
    store.append(result);
}
