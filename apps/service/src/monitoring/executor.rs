use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::time::timeout;

use super::checker::{Checker, HtmlChecker, WpScanChecker};
use super::types::{CheckKind, CheckResult, MonitorDefinition};

/// Monitoring executor - executes individual monitoring checks
pub struct MonitoringExecutor {
    checkers: HashMap<CheckKind, Arc<dyn Checker>>,
    scan_timeout: Duration,
}

impl MonitoringExecutor {
    /// Executor with no checkers bound
    pub fn empty(scan_timeout: Duration) -> Self {
        Self { checkers: HashMap::new(), scan_timeout }
    }

    /// Create an executor with the built-in checker for every kind
    pub fn new(scan_timeout: Duration) -> Result<Self> {
        let mut executor = Self::empty(scan_timeout);
        executor.register(CheckKind::Html, Arc::new(HtmlChecker::new(scan_timeout)?));
        executor.register(CheckKind::WpScan, Arc::new(WpScanChecker::new()));
        Ok(executor)
    }

    /// Bind a checker to a kind, replacing any previous binding
    pub fn register(&mut self, kind: CheckKind, checker: Arc<dyn Checker>) {
        self.checkers.insert(kind, checker);
    }

    /// Execute a monitoring check. Every failure ends up inside the result.
    pub async fn execute_check(&self, monitor: &MonitorDefinition) -> CheckResult {
        let started_at = SystemTime::now();
        let result = CheckResult::new(monitor.key(), monitor.kind, started_at);

        if monitor.target.trim().is_empty() {
            return result.failure("Scan cannot run if the target isn't set".to_string());
        }

        let Some(checker) = self.checkers.get(&monitor.kind) else {
            return result.failure(format!("No checker registered for {} scans", monitor.kind));
        };

        let start = Instant::now();
        let outcome = timeout(self.scan_timeout, checker.check(&monitor.target)).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(output)) => {
                let result =
                    result.with_payload(output.payload).with_timing(latency_ms, output.status_code);
                match output.error {
                    Some(error) => result.failure(error),
                    None => result,
                }
            }
            Ok(Err(e)) => result.with_timing(latency_ms, None).failure(e.to_string()),
            Err(_) => result
                .with_timing(latency_ms, None)
                .failure(format!("Scan timed out after {}s", self.scan_timeout.as_secs())),
        }
    }
}
