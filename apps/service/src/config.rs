use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config file {path}: {source}")]
    Read { path: path::PathBuf, source: io::Error },
    #[error("Failed to write config file {path}: {source}")]
    Write { path: path::PathBuf, source: io::Error },
    #[error("Failed to parse config file {path}: {source}")]
    Parse { path: path::PathBuf, source: toml::de::Error },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Could not determine a config directory, pass --config explicitly")]
    ConfigPathUnavailable,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preferences: Preferences,
    pub email: EmailSettings,
    pub scans: Vec<ScanConfig>,
    pub alerts: Vec<AlertConfig>,
}

/// Engine tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Seconds between two scheduler ticks
    pub tick_seconds: u64,
    /// Results kept per monitor
    pub cache_length: usize,
    pub scan_timeout_seconds: u64,
    pub notify_timeout_seconds: u64,
    /// 1 runs scans one after another
    pub max_concurrent_scans: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            tick_seconds: 60,
            cache_length: 100,
            scan_timeout_seconds: 300,
            notify_timeout_seconds: 30,
            max_concurrent_scans: 1,
        }
    }
}

impl Preferences {
    /// Replace zero values with their defaults, warning about each one
    pub fn normalized(&self) -> Self {
        let defaults = Self::default();
        let pick = |name: &str, value: u64, default: u64| {
            if value == 0 {
                tracing::warn!("preferences.{} must be greater than 0, using {}", name, default);
                default
            } else {
                value
            }
        };

        Self {
            tick_seconds: pick("tick_seconds", self.tick_seconds, defaults.tick_seconds),
            cache_length: pick(
                "cache_length",
                self.cache_length as u64,
                defaults.cache_length as u64,
            ) as usize,
            scan_timeout_seconds: pick(
                "scan_timeout_seconds",
                self.scan_timeout_seconds,
                defaults.scan_timeout_seconds,
            ),
            notify_timeout_seconds: pick(
                "notify_timeout_seconds",
                self.notify_timeout_seconds,
                defaults.notify_timeout_seconds,
            ),
            max_concurrent_scans: pick(
                "max_concurrent_scans",
                self.max_concurrent_scans as u64,
                defaults.max_concurrent_scans as u64,
            ) as usize,
        }
    }
}

/// Sender identity for email alerts. Unset fields fall back to the
/// `SENDGRID_SENDER_NAME` / `SENDGRID_SENDER_EMAIL` environment variables.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    /// Override of the SendGrid `mail/send` endpoint
    pub api_url: Option<String>,
}

/// One `[[scans]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, alias = "uris")]
    pub targets: Vec<String>,
    /// Minimum time between two runs, e.g. `1h30m`
    #[serde(default)]
    pub every: Option<String>,
    /// Reserved, not used by the scheduler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// One `[[alerts]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_alert_kind")]
    pub kind: String,
    pub regex: String,
    /// Part of the result matched by `regex`: `output` (default) or `error`
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default, alias = "uris")]
    pub targets: Vec<String>,
    /// Name of the scan the targets belong to
    #[serde(default)]
    pub scan: Option<String>,
    /// Comma separated `Full Name address@host` entries
    #[serde(default, alias = "sendTo")]
    pub send_to: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

fn default_alert_kind() -> String {
    "email".to_string()
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/telescope/config.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("telescope/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Preferences")?;
        write_1(f, "Tick (s)", &self.preferences.tick_seconds)?;
        write_1(f, "Cache Length", &self.preferences.cache_length)?;
        write_1(f, "Scan Timeout (s)", &self.preferences.scan_timeout_seconds)?;
        write_1(f, "Notify Timeout (s)", &self.preferences.notify_timeout_seconds)?;
        write_1(f, "Concurrent Scans", &self.preferences.max_concurrent_scans)?;

        write_title_1(f, "Scans")?;
        for scan in &self.scans {
            write_1(f, &scan.name, &scan.kind)?;
            write_2(f, "Every", &scan.every.as_deref().unwrap_or("<default>"))?;
            write_2(f, "Targets", &scan.targets.join(", "))?;
        }

        write_title_1(f, "Alerts")?;
        for alert in &self.alerts {
            write_1(f, &alert.name, &alert.kind)?;
            write_2(f, "Regex", &alert.regex)?;
            write_2(f, "Targets", &alert.targets.join(", "))?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/telescope/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::Read { path: config_path.clone(), source })?;
            Self::parse(&raw_string).map_err(|source| Error::Parse { path: config_path, source })
        } else {
            tracing::warn!(
                "No config file at {}, writing an empty default one",
                config_path.display()
            );
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::Write { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| Error::Write { path: path.to_path_buf(), source })
    }
}
