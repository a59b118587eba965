use std::path::PathBuf;
use std::time::SystemTime;

use clap::Parser;
use tracing::{debug, error, info};

use telescope::{Config, Scheduler};

/// A website monitor for changes, outages, and vulnerabilities
#[derive(Debug, Parser)]
#[command(name = "telescope", version, about)]
struct Cli {
    /// Config file (default is $XDG_CONFIG_HOME/telescope/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logger::init(cli.debug);

    let config = match Config::from_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    debug!("{config}");

    let mut scheduler = Scheduler::from_config(&config)?;

    if cli.once {
        let report = scheduler.tick(SystemTime::now()).await;
        info!(?report, "Single tick completed");
        for monitor in scheduler.monitors() {
            let key = monitor.key();
            let retained = scheduler.store().history(&key);
            if let Some(latest) = retained.last() {
                info!(monitor = %key, status = %latest.status, retained = retained.len(), "Latest result");
            }
        }
        return Ok(());
    }

    tokio::select! {
        _ = scheduler.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received interrupt, shutting down");
        }
    }

    Ok(())
}
