use std::collections::{HashMap, VecDeque};
use tracing::debug;

use super::{ResultStore, StoreError};
use crate::monitoring::types::{CheckResult, StoreKey};

/// Default number of results kept per key
pub const DEFAULT_CACHE_LENGTH: usize = 100;

/// Holds check results in memory, at most `capacity` per key
#[derive(Debug)]
pub struct InMemoryStore {
    capacity: usize,
    cache: HashMap<StoreKey, VecDeque<CheckResult>>,
}

impl InMemoryStore {
    /// A capacity of zero is raised to one so `latest` stays meaningful
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), cache: HashMap::new() }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_LENGTH)
    }
}

impl ResultStore for InMemoryStore {
    fn append(&mut self, result: CheckResult) {
        let capacity = self.capacity;
        let entries = self
            .cache
            .entry(result.key.clone())
            .or_insert_with(|| VecDeque::with_capacity(capacity));

        debug!(key = %result.key, "Saved result to the scan cache");
        entries.push_back(result);

        if entries.len() > capacity {
            entries.pop_front();
        }
    }

    fn latest(&self, key: &StoreKey) -> Result<&CheckResult, StoreError> {
        self.cache
            .get(key)
            .and_then(VecDeque::back)
            .ok_or_else(|| StoreError::NoHistory { key: key.clone() })
    }

    fn count_for(&self, key: &StoreKey) -> usize {
        self.cache.get(key).map_or(0, VecDeque::len)
    }

    fn history(&self, key: &StoreKey) -> Vec<&CheckResult> {
        self.cache.get(key).map(|entries| entries.iter().collect()).unwrap_or_default()
    }

    fn key_count(&self) -> usize {
        self.cache.len()
    }
}
