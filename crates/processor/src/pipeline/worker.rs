//! Single-writer owner of the purchase aggregation
//!
//! All purchase values flow through one bounded queue into one task that
//! owns the [`TriggeredAggregation`]. Merges are applied strictly in queue
//! order and each merge is followed by its trigger check before the next
//! merge starts. Firings are forwarded to the aggregate destination writer.

use super::engine::{Firing, TriggeredAggregation, WindowPhase};
use crate::error::{AggregationError, AggregationResult};
use crate::metrics::PipelineMetrics;
use crate::sink::DestinationHandle;
use retail_types::{AggregateRecord, PurchaseValue};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

enum Command {
    Merge(PurchaseValue),
    State(oneshot::Sender<AggregationState>),
}

/// Copy of the aggregation state at one point in the queue
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationState {
    pub phase: WindowPhase,
    pub element_count: u64,
    pub firings: u64,
    pub rows: Vec<AggregateRecord>,
}

/// Final counts of the aggregation worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSummary {
    /// Purchases merged
    pub merged: u64,
    /// Purchases whose value could not be merged
    pub rejected: u64,
    /// Trigger firings
    pub firings: u64,
    /// Rows handed to the aggregate writer
    pub rows_emitted: u64,
    /// Rows the aggregate writer refused
    pub rows_undelivered: u64,
}

/// Handle for submitting purchases to the aggregation worker
#[derive(Debug, Clone)]
pub struct AggregationHandle {
    tx: mpsc::Sender<Command>,
}

impl AggregationHandle {
    /// Queue a purchase; waits while the queue is full
    pub async fn submit(&self, purchase: PurchaseValue) -> AggregationResult<()> {
        self.tx
            .send(Command::Merge(purchase))
            .await
            .map_err(|_| AggregationError::WorkerClosed)
    }

    /// Current state, after every purchase queued before this call
    pub async fn state(&self) -> AggregationResult<AggregationState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::State(reply_tx))
            .await
            .map_err(|_| AggregationError::WorkerClosed)?;
        reply_rx.await.map_err(|_| AggregationError::WorkerClosed)
    }
}

/// Task owning the windowed aggregation
pub struct AggregationWorker {
    engine: TriggeredAggregation,
    rx: mpsc::Receiver<Command>,
    output: DestinationHandle,
    metrics: PipelineMetrics,
    summary: AggregationSummary,
}

impl AggregationWorker {
    /// Spawn the worker
    ///
    /// The task drains its queue and ends once every [`AggregationHandle`] is
    /// dropped. Dropping the worker also drops its aggregate writer handle.
    pub fn spawn(
        engine: TriggeredAggregation,
        capacity: usize,
        output: DestinationHandle,
        metrics: PipelineMetrics,
    ) -> (AggregationHandle, JoinHandle<AggregationSummary>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = Self {
            engine,
            rx,
            output,
            metrics,
            summary: AggregationSummary::default(),
        };
        (AggregationHandle { tx }, tokio::spawn(worker.run()))
    }

    async fn run(mut self) -> AggregationSummary {
        info!("Aggregation worker started");

        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Merge(purchase) => self.on_purchase(purchase).await,
                Command::State(reply) => {
                    let _ = reply.send(self.state());
                }
            }
        }

        info!(
            merged = self.summary.merged,
            firings = self.summary.firings,
            rows_emitted = self.summary.rows_emitted,
            active_keys = self.engine.active_keys(),
            "Aggregation worker stopped"
        );
        self.summary
    }

    async fn on_purchase(&mut self, purchase: PurchaseValue) {
        match self.engine.on_purchase(&purchase) {
            Ok(firing) => {
                self.summary.merged += 1;
                self.metrics.record_merge(self.engine.active_keys());
                debug!(
                    user_id = %purchase.user_id,
                    value = purchase.value,
                    element_count = self.engine.element_count(),
                    "Purchase merged"
                );

                if let Some(firing) = firing {
                    self.emit(firing).await;
                }
            }
            Err(e) => {
                self.summary.rejected += 1;
                warn!(user_id = %purchase.user_id, error = %e, "Purchase value rejected");
            }
        }
    }

    async fn emit(&mut self, firing: Firing) {
        self.summary.firings += 1;
        self.metrics.record_firing(firing.rows.len());
        info!(
            window = %firing.window,
            sequence = firing.sequence,
            element_count = firing.element_count,
            rows = firing.rows.len(),
            purged = firing.purged,
            "Trigger fired"
        );

        for record in firing.rows {
            match self.output.write(record.to_row()).await {
                Ok(()) => self.summary.rows_emitted += 1,
                Err(e) => {
                    self.summary.rows_undelivered += 1;
                    error!(user_id = %record.user_id, error = %e, "Aggregate row not delivered");
                }
            }
        }
    }

    fn state(&self) -> AggregationState {
        AggregationState {
            phase: self.engine.phase(),
            element_count: self.engine.element_count(),
            firings: self.engine.firings(),
            rows: self.engine.snapshot(),
        }
    }
}
