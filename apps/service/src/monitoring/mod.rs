//! Monitoring engine module - handles execution of monitoring checks
//!
//! This module is responsible for:
//! - Running content fetches and vulnerability scans
//! - Deciding which monitors are due on every tick
//! - Storing results and evaluating alerts against them

pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod types;
pub mod validation;

#[cfg(test)]
mod tests;

pub use executor::MonitoringExecutor;
pub use scheduler::{Scheduler, SchedulerOptions, TickReport};
pub use types::{CheckKind, CheckResult, MonitorDefinition, StoreKey};
