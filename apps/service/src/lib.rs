//! Telescope - a website monitor for changes, outages, and vulnerabilities
//!
//! Scans run on a fixed tick, their results are kept in a bounded
//! in-memory history and alert rules are matched against the latest
//! result of every target they watch.

pub mod alerting;
pub mod config;
pub mod monitoring;
pub mod registry;
pub mod storage;

pub use config::Config;
pub use monitoring::{Scheduler, SchedulerOptions, TickReport};
pub use registry::Registry;
