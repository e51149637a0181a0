use super::sum::SumAggregator;
use super::trait_::Aggregator;
use crate::error::{AggregationError, AggregationResult};

use std::collections::BTreeMap;

/// Running sums per key
///
/// A key is created at zero on its first merge and is never removed except
/// by [`KeyedCombiner::clear`]. Snapshots are ordered by key.
#[derive(Debug, Clone, Default)]
pub struct KeyedCombiner {
    sums: BTreeMap<String, SumAggregator>,
}

impl KeyedCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the total of `key` and return the new total
    ///
    /// A value that is not finite, or that would overflow the total, is
    /// rejected and leaves every key unchanged.
    pub fn merge(&mut self, key: &str, value: f64) -> AggregationResult<f64> {
        let mut sum = self.sums.get(key).copied().unwrap_or_default();

        sum.update(value)
            .map_err(|e| AggregationError::InvalidValue {
                key: key.to_string(),
                value,
                reason: e.to_string(),
            })?;

        let total = sum.current();
        self.sums.insert(key.to_string(), sum);
        Ok(total)
    }

    /// Current total of a key
    pub fn get(&self, key: &str) -> Option<f64> {
        self.sums.get(key).map(Aggregator::current)
    }

    /// Copy of every `(key, total)` pair
    pub fn snapshot(&self) -> Vec<(String, f64)> {
        self.sums
            .iter()
            .map(|(key, sum)| (key.clone(), sum.current()))
            .collect()
    }

    /// Number of values merged across all keys
    pub fn merged_values(&self) -> u64 {
        self.sums.values().map(Aggregator::count).sum()
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Drop every key
    pub fn clear(&mut self) {
        self.sums.clear();
    }
}
