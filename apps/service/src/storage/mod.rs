//! Result storage layer
//!
//! Check results are kept per monitor key in a bounded history.
//! [`InMemoryStore`] is the only backend, history does not survive a
//! restart.

pub mod memory;

pub use memory::InMemoryStore;

use thiserror::Error;

use crate::monitoring::types::{CheckResult, StoreKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("No results stored yet for {key}")]
    NoHistory { key: StoreKey },
}

/// Storage trait for check results
pub trait ResultStore: Send + Sync {
    /// Append a result under its own key, evicting the oldest entry once the
    /// key holds more than the configured capacity
    fn append(&mut self, result: CheckResult);

    /// Most recently appended result for `key`
    fn latest(&self, key: &StoreKey) -> Result<&CheckResult, StoreError>;

    /// Number of retained results for `key`
    fn count_for(&self, key: &StoreKey) -> usize;

    /// Retained results for `key`, oldest first
    fn history(&self, key: &StoreKey) -> Vec<&CheckResult>;

    /// Number of keys that have ever been written
    fn key_count(&self) -> usize;
}
