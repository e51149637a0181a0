//! Aggregation of purchase values
//!
//! [`SumAggregator`] keeps one compensated running sum; [`KeyedCombiner`]
//! keeps one per user. Both are owned by the aggregation worker and are
//! never shared between tasks.
//!
//! # Examples
//!
//! ```rust
//! use retail_processor::aggregation::KeyedCombiner;
//!
//! let mut combiner = KeyedCombiner::new();
//! combiner.merge("A", 10.0).unwrap();
//! combiner.merge("A", 10.0).unwrap();
//! combiner.merge("B", 5.0).unwrap();
//!
//! assert_eq!(
//!     combiner.snapshot(),
//!     vec![("A".to_string(), 20.0), ("B".to_string(), 5.0)]
//! );
//! ```

// Re-name to avoid collision with trait
mod trait_;

mod keyed;
mod sum;

pub use trait_::Aggregator;

pub use keyed::KeyedCombiner;
pub use sum::SumAggregator;
