//! Load-time validation for monitor definitions.
//!
//! Nothing here is fatal: a bad interval degrades to [`DEFAULT_INTERVAL`]
//! and a suspicious target only produces a warning, the check itself will
//! record the failure on every run.

use anyhow::{Result, anyhow, bail};
use std::time::Duration;
use url::Url;

use super::types::CheckKind;

/// Interval used when a scan's `every` attribute can't be parsed
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(24 * 3600);

const VALID_UNITS: &str = "\"ns\", \"us\" (or \"µs\"), \"ms\", \"s\", \"m\", \"h\"";

/// Parse a duration such as `90s`, `1h30m` or `1.5h`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. Negative durations are
/// rejected, a bare `0` is accepted.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        bail!("empty duration");
    }
    if s.starts_with('-') {
        bail!("negative duration: {}", s);
    }
    let s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = s;
    let mut total_nanos: u128 = 0;

    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            bail!("invalid duration {:?}: expected a number", s);
        }

        let unit_len = tail.find(|c: char| !c.is_alphabetic()).unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        if unit.is_empty() {
            bail!("missing unit in duration {:?}", s);
        }

        let nanos = component_nanos(number, unit_nanos(unit)?)
            .ok_or_else(|| anyhow!("invalid duration {:?}", s))?;
        total_nanos = total_nanos
            .checked_add(nanos)
            .filter(|n| *n <= u64::MAX as u128)
            .ok_or_else(|| anyhow!("duration out of range: {}", s))?;
        rest = tail;
    }

    Ok(Duration::from_nanos(total_nanos as u64))
}

fn unit_nanos(unit: &str) -> Result<u128> {
    Ok(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3600 * 1_000_000_000,
        other => bail!("unknown unit {:?} in duration", other),
    })
}

/// `number` is digits with at most one dot
fn component_nanos(number: &str, unit: u128) -> Option<u128> {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };
    if fraction.contains('.') {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit)?;

    if !fraction.is_empty() {
        // Anything past nanosecond precision is dropped
        let digits = &fraction[..fraction.len().min(18)];
        let scale = 10u128.pow(digits.len() as u32);
        let fraction: u128 = digits.parse().ok()?;
        nanos = nanos.checked_add(fraction.checked_mul(unit)? / scale)?;
    }

    Some(nanos)
}

/// Parse the `every` attribute of a scan, falling back to
/// [`DEFAULT_INTERVAL`] with a diagnostic when it is missing or malformed.
pub fn interval_or_default(scan_name: &str, every: Option<&str>) -> Duration {
    let Some(every) = every else {
        tracing::warn!(
            scan = %scan_name,
            "No `every` attribute set, defaulting to {}h",
            DEFAULT_INTERVAL.as_secs() / 3600
        );
        return DEFAULT_INTERVAL;
    };

    match parse_interval(every) {
        Ok(interval) => interval,
        Err(e) => {
            tracing::warn!(
                scan = %scan_name,
                every = %every,
                error = %e,
                "Could not parse duration, please check the every attribute. Valid time units are {}. Defaulting to {}h",
                VALID_UNITS,
                DEFAULT_INTERVAL.as_secs() / 3600
            );
            DEFAULT_INTERVAL
        }
    }
}

/// Validates a monitor target based on its kind
pub fn validate_monitor_target(target: &str, kind: CheckKind) -> Result<()> {
    if target.trim().is_empty() {
        bail!("target is empty");
    }

    match kind {
        CheckKind::Html | CheckKind::WpScan => validate_http_target(target),
    }
}

/// Validate HTTP/HTTPS target
fn validate_http_target(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => bail!("Invalid scheme for a web monitor: {}", other),
    }

    if url.host_str().is_none() {
        bail!("URL has no host: {}", target);
    }

    if url.port() == Some(0) {
        bail!("Port 0 is not valid");
    }

    Ok(())
}
