use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

/// Type of monitoring check to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    /// Fetch the target over HTTP(S) and keep the body
    Html,
    /// Run `wpscan` against the target and keep its stdout
    WpScan,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Html => write!(f, "html"),
            CheckKind::WpScan => write!(f, "wpscan"),
        }
    }
}

impl FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htmlscan" | "http" | "https" | "content" => Ok(CheckKind::Html),
            "wpscan" | "vulnerability" => Ok(CheckKind::WpScan),
            other => Err(format!("unknown scan type: {other}")),
        }
    }
}

/// Storage key of a monitor: the (name, target) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    pub name: String,
    pub target: String,
}

impl StoreKey {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self { name: name.into(), target: target.into() }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.target)
    }
}

/// One configured check against one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDefinition {
    pub name: String,
    pub target: String,
    pub kind: CheckKind,
    /// Minimum time between two runs of this (name, target) pair
    pub interval: Duration,
}

impl MonitorDefinition {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        kind: CheckKind,
        interval: Duration,
    ) -> Self {
        Self { name: name.into(), target: target.into(), kind, interval }
    }

    pub fn key(&self) -> StoreKey {
        StoreKey::new(self.name.clone(), self.target.clone())
    }

    /// Whether enough time has passed since `last_run` to run again.
    ///
    /// A monitor that never ran is always eligible. Otherwise the elapsed
    /// time must be strictly greater than the interval. A last run in the
    /// future (clock moved backwards) counts as zero elapsed time.
    pub fn is_eligible(&self, last_run: Option<SystemTime>, now: SystemTime) -> bool {
        match last_run {
            None => true,
            Some(last_run) => {
                let elapsed = now.duration_since(last_run).unwrap_or_default();
                elapsed > self.interval
            }
        }
    }
}

/// Status of a monitoring check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    Up,
    Down,
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
        }
    }
}

/// Result of a monitoring check
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    /// Monitor this result belongs to
    pub key: StoreKey,

    /// Kind of check that produced it
    pub kind: CheckKind,

    /// Time the run started
    pub timestamp: SystemTime,

    /// Status of the check (up/down)
    pub status: MonitorStatus,

    /// Observable content used for alert matching (body or scanner stdout)
    pub payload: String,

    /// Response time in milliseconds
    pub latency_ms: Option<u64>,

    /// HTTP status code (if applicable)
    pub status_code: Option<u16>,

    /// Error message (if check failed)
    pub error_message: Option<String>,
}

impl CheckResult {
    /// Create a new check result stamped with the run start time
    pub fn new(key: StoreKey, kind: CheckKind, timestamp: SystemTime) -> Self {
        Self {
            key,
            kind,
            timestamp,
            status: MonitorStatus::Up,
            payload: String::new(),
            latency_ms: None,
            status_code: None,
            error_message: None,
        }
    }

    /// Attach the observed payload
    pub fn with_payload(mut self, payload: String) -> Self {
        self.payload = payload;
        self
    }

    /// Record latency and optional status code
    pub fn with_timing(mut self, latency_ms: u64, status_code: Option<u16>) -> Self {
        self.latency_ms = Some(latency_ms);
        self.status_code = status_code;
        self
    }

    /// Mark the check as failed with error
    pub fn failure(mut self, error: String) -> Self {
        self.status = MonitorStatus::Down;
        self.error_message = Some(error);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status == MonitorStatus::Down
    }
}
