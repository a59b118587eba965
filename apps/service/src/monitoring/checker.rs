use anyhow::{Result, anyhow};
use std::env;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::process::Command;

/// Environment variable holding the WPVulnDB API token
pub const WPVULNDB_API_KEY: &str = "WPVULNDB_API_KEY";

const USER_AGENT: &str = concat!("telescope/", env!("CARGO_PKG_VERSION"));

/// What a checker observed on the target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutput {
    /// Content used for alert matching
    pub payload: String,
    pub status_code: Option<u16>,
    /// Set when the target answered but the answer counts as a failure
    pub error: Option<String>,
}

/// Checker trait for different types of monitoring checks
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Perform the check. `Err` means nothing could be observed at all.
    async fn check(&self, target: &str) -> Result<ScanOutput>;
}

/// HTTP/HTTPS content fetcher
pub struct HtmlChecker {
    client: reqwest::Client,
}

impl HtmlChecker {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).user_agent(USER_AGENT).build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HtmlChecker {
    async fn check(&self, target: &str) -> Result<ScanOutput> {
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let status = response.status();
        let payload = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body: {}", e))?;

        // Keep the body even for error pages, it is often what alerts match on
        let error = if status.is_success() || status.is_redirection() {
            None
        } else {
            Some(format!("HTTP check failed with status code: {}", status.as_u16()))
        };

        Ok(ScanOutput { payload, status_code: Some(status.as_u16()), error })
    }
}

/// Vulnerability scanner backed by the `wpscan` executable
pub struct WpScanChecker {
    program: String,
    api_token: Option<String>,
}

impl WpScanChecker {
    /// Use `wpscan` from `PATH`, picking up the API token from the environment
    pub fn new() -> Self {
        let api_token = env::var(WPVULNDB_API_KEY).ok().filter(|token| !token.is_empty());
        Self::with_program("wpscan", api_token)
    }

    pub fn with_program(program: impl Into<String>, api_token: Option<String>) -> Self {
        Self { program: program.into(), api_token }
    }

    fn args(&self, target: &str) -> Vec<String> {
        let mut args = vec!["--url".to_string(), target.to_string()];
        if let Some(token) = &self.api_token {
            args.push("--api-token".to_string());
            args.push(token.clone());
        }
        args
    }
}

impl Default for WpScanChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Checker for WpScanChecker {
    async fn check(&self, target: &str) -> Result<ScanOutput> {
        let output = Command::new(&self.program)
            .args(self.args(target))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => anyhow!("{} executable not found in PATH", self.program),
                _ => anyhow!("Failed to run {}: {}", self.program, e),
            })?;

        let payload = String::from_utf8_lossy(&output.stdout).into_owned();
        let error = if output.status.success() {
            None
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Some(format!("{} exited with {}: {}", self.program, output.status, stderr.trim()))
        };

        Ok(ScanOutput { payload, status_code: None, error })
    }
}
