//! Tracing setup shared by the telescope binaries.
//!
//! `RUST_LOG` overrides the default directive, `RUST_LOG_FORMAT=json`
//! switches to structured JSON lines.

use std::env::var;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    Layer, Registry, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Output format of the log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Read the format from `RUST_LOG_FORMAT`, falling back to compact output
    pub fn from_env() -> Self {
        var("RUST_LOG_FORMAT").map(|value| Self::parse(&value)).unwrap_or_default()
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Default level for the given verbosity
pub fn default_level(verbose: bool) -> LevelFilter {
    if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO }
}

/// Install the global subscriber. Panics if one is already set.
pub fn init(verbose: bool) {
    build(default_level(verbose), LogFormat::from_env()).init();
}

fn build(
    level: LevelFilter,
    format: LogFormat,
) -> tracing_subscriber::layer::Layered<Box<dyn Layer<Registry> + Send + Sync>, Registry> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer)
}
