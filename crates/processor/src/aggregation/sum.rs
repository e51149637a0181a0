use super::trait_::Aggregator;

use anyhow::bail;

/// Sum aggregator with compensated (Neumaier) summation
///
/// Purchase values are decimal amounts; plain `f64` addition drifts after
/// many small additions, so the rounding error of every step is carried in
/// a separate compensation term and folded back into the result.
///
/// An update whose new total would not be finite is rejected and leaves the
/// sum unchanged.
///
/// # Examples
///
/// ```
/// use retail_processor::aggregation::{Aggregator, SumAggregator};
///
/// let mut agg = SumAggregator::new();
/// for _ in 0..10 {
///     agg.update(0.1).unwrap();
/// }
///
/// assert_eq!(agg.current(), 1.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SumAggregator {
    sum: f64,
    compensation: f64,
    count: u64,
}

impl SumAggregator {
    /// Create a new sum aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// State after adding `value`, without applying it
    fn added(&self, value: f64) -> Self {
        let sum = self.sum + value;
        let step = if self.sum.abs() >= value.abs() {
            (self.sum - sum) + value
        } else {
            (value - sum) + self.sum
        };

        Self {
            sum,
            compensation: self.compensation + step,
            count: self.count + 1,
        }
    }
}

impl Aggregator for SumAggregator {
    type Input = f64;
    type Output = f64;

    fn new() -> Self {
        Self::new()
    }

    fn update(&mut self, value: f64) -> anyhow::Result<()> {
        if !value.is_finite() {
            bail!("cannot add non-finite value {} to a sum", value);
        }

        let next = self.added(value);
        if !next.sum.is_finite() || !next.current().is_finite() {
            bail!("adding {} overflows the sum {}", value, self.current());
        }

        *self = next;
        Ok(())
    }

    fn current(&self) -> f64 {
        self.sum + self.compensation
    }

    fn count(&self) -> u64 {
        self.count
    }
}
