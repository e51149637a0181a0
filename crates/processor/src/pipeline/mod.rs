//! Stream processing pipeline
//!
//! Wires the stages together:
//!
//! ```text
//! payload ─▶ decode ─▶ classify ─┬─ view ──────▶ project ─▶ item_views writer
//!                                ├─ cart_add ──▶ project ─▶ add_to_carts writer
//!                                ├─ purchase ──▶ extract ─▶ aggregation worker ─▶ aggregates writer
//!                                └─ other ─────▶ dropped
//! ```
//!
//! - [`StreamPipelineBuilder`] validates configuration and builds a
//!   [`StreamPipeline`]
//! - [`StreamExecutor`] runs payloads through the stages
//! - [`AggregationWorker`] owns the windowed per-user sums
//! - [`TriggeredAggregation`] is the window/trigger/combiner state machine
//!
//! # Example
//!
//! ```rust,no_run
//! use retail_processor::pipeline::StreamPipelineBuilder;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> retail_processor::error::Result<()> {
//! let pipeline = StreamPipelineBuilder::new()
//!     .with_trigger_count(10)
//!     .with_parallelism(1)
//!     .build()?;
//!
//! let executor = pipeline.create_executor()?;
//! let (tx, rx) = mpsc::channel(1_000);
//!
//! tx.send(br#"{"event": "view_item"}"#.to_vec()).await.ok();
//! drop(tx);
//!
//! executor.run(rx).await?;
//! let report = executor.shutdown().await?;
//! println!("dropped {} events", report.stats.events_dropped());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod engine;
pub mod executor;
pub mod stats;
pub mod worker;

pub use builder::{StreamPipeline, StreamPipelineBuilder};
pub use engine::{Firing, TriggeredAggregation, WindowPhase};
pub use executor::{Outcome, ShutdownReport, StreamExecutor};
pub use stats::PipelineStats;
pub use worker::{AggregationHandle, AggregationState, AggregationSummary, AggregationWorker};
