use std::fmt::Debug;

/// Core trait for incremental aggregators
///
/// Values are fed one at a time. A value the aggregator cannot take must be
/// rejected without changing the current result.
pub trait Aggregator: Send + Sync + Debug {
    /// The type of values this aggregator accepts
    type Input: Clone;

    /// The type of the aggregation result
    type Output: Clone;

    /// Create a new aggregator instance
    fn new() -> Self
    where
        Self: Sized;

    /// Update the aggregator with a new value
    fn update(&mut self, value: Self::Input) -> anyhow::Result<()>;

    /// Current aggregation result
    fn current(&self) -> Self::Output;

    /// Get the number of values processed so far
    fn count(&self) -> u64;

    /// Check if the aggregator has processed any values
    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
