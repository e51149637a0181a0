//! Per-destination ordered writer

use super::{Destination, TableSink, TableTarget};
use crate::config::SinkConfig;
use crate::error::{SinkError, SinkResult};
use crate::metrics::{PipelineMetrics, ResultLabel};
use retail_types::TableRow;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Cheap handle used to enqueue rows for one destination
#[derive(Debug, Clone)]
pub struct DestinationHandle {
    destination: Destination,
    tx: mpsc::Sender<TableRow>,
    halted: Arc<AtomicBool>,
}

impl DestinationHandle {
    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// Enqueue a row; waits while the queue is full
    pub async fn write(&self, row: TableRow) -> SinkResult<()> {
        if self.is_halted() {
            return Err(SinkError::Halted {
                destination: self.destination.to_string(),
            });
        }

        self.tx.send(row).await.map_err(|_| SinkError::Closed {
            destination: self.destination.to_string(),
        })
    }

    /// Whether the writer stopped after a permanent failure
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

/// Final counts of a writer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterSummary {
    /// Rows appended
    pub written: u64,
    /// Rows given up on after retries
    pub failed: u64,
    /// Rows discarded because the writer was halted
    pub discarded: u64,
    /// Whether the writer halted
    pub halted: bool,
}

/// Task appending the rows of one destination in queue order
///
/// Transient failures and timeouts are retried with exponential backoff up to
/// `max_retries` times; a row that still fails is logged and dropped. A schema
/// mismatch halts the writer: later rows for this destination are discarded
/// and new writes are rejected, while other destinations keep running.
pub struct DestinationWriter {
    destination: Destination,
    target: TableTarget,
    sink: Arc<dyn TableSink>,
    config: SinkConfig,
    metrics: PipelineMetrics,
    rx: mpsc::Receiver<TableRow>,
    halted: Arc<AtomicBool>,
    table_ready: bool,
    summary: WriterSummary,
}

impl DestinationWriter {
    /// Spawn a writer task
    ///
    /// The task ends once every [`DestinationHandle`] is dropped and the queue
    /// is drained.
    pub fn spawn(
        destination: Destination,
        target: TableTarget,
        sink: Arc<dyn TableSink>,
        config: SinkConfig,
        metrics: PipelineMetrics,
    ) -> (DestinationHandle, JoinHandle<WriterSummary>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let halted = Arc::new(AtomicBool::new(false));

        let writer = Self {
            destination,
            target,
            sink,
            config,
            metrics,
            rx,
            halted: halted.clone(),
            table_ready: false,
            summary: WriterSummary::default(),
        };

        let handle = DestinationHandle {
            destination,
            tx,
            halted,
        };

        (handle, tokio::spawn(writer.run()))
    }

    async fn run(mut self) -> WriterSummary {
        info!(
            destination = %self.destination,
            table = %self.target.table,
            "Destination writer started"
        );

        while let Some(row) = self.rx.recv().await {
            if self.summary.halted {
                self.summary.discarded += 1;
                continue;
            }

            match self.write_with_retry(&row).await {
                Ok(()) => {
                    self.summary.written += 1;
                    self.metrics.record_write(self.destination, ResultLabel::Success);
                }
                Err(e) if e.is_permanent() => {
                    self.metrics.record_write(self.destination, ResultLabel::Error);
                    self.halt(&e);
                }
                Err(e) => {
                    self.summary.failed += 1;
                    self.metrics.record_write(self.destination, ResultLabel::Error);
                    error!(
                        destination = %self.destination,
                        table = %self.target.table,
                        error = %e,
                        "Dropping row after exhausting retries"
                    );
                }
            }
        }

        if let Err(e) = self.sink.flush().await {
            warn!(destination = %self.destination, error = %e, "Flush on shutdown failed");
        }

        info!(
            destination = %self.destination,
            written = self.summary.written,
            failed = self.summary.failed,
            discarded = self.summary.discarded,
            halted = self.summary.halted,
            "Destination writer stopped"
        );

        self.summary
    }

    fn halt(&mut self, cause: &SinkError) {
        self.summary.halted = true;
        self.halted.store(true, Ordering::Release);
        self.metrics.record_halt(self.destination);
        error!(
            destination = %self.destination,
            table = %self.target.table,
            error = %cause,
            "Halting destination writer"
        );
    }

    async fn attempt(&mut self, row: &TableRow) -> SinkResult<()> {
        let timeout_ms = self.config.write_timeout_ms;
        let call = async {
            if !self.table_ready {
                self.sink.ensure_table(&self.target).await?;
            }
            self.sink.append(&self.target, row).await
        };

        let result = match timeout(self.config.write_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout {
                destination: self.target.table.clone(),
                timeout_ms,
            }),
        };

        if result.is_ok() {
            self.table_ready = true;
        }
        result
    }

    /// Append with retry logic
    async fn write_with_retry(&mut self, row: &TableRow) -> SinkResult<()> {
        let mut retries = 0;
        let max_retries = self.config.max_retries;

        loop {
            match self.attempt(row).await {
                Ok(()) => {
                    if retries > 0 {
                        debug!(
                            destination = %self.destination,
                            retries,
                            "Row appended after retries"
                        );
                    }
                    return Ok(());
                }
                Err(err) => {
                    if !should_retry(&err, retries, max_retries) {
                        return Err(err);
                    }

                    retries += 1;
                    self.metrics.record_retry(self.destination);

                    let backoff = calculate_backoff(&self.config, retries);
                    warn!(
                        destination = %self.destination,
                        attempt = retries,
                        max_attempts = max_retries + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Append failed, retrying"
                    );
                    sleep(backoff).await;
                }
            }
        }
    }
}

/// Check if an append error should be retried
fn should_retry(error: &SinkError, retries: u32, max_retries: u32) -> bool {
    retries < max_retries && error.is_retriable()
}

/// Exponential backoff for the given retry (1-based), capped
fn calculate_backoff(config: &SinkConfig, retry_count: u32) -> Duration {
    let exponent = retry_count.saturating_sub(1).min(10);
    let backoff_ms = config.retry_backoff_ms.saturating_mul(2u64.pow(exponent));
    Duration::from_millis(backoff_ms.min(config.max_backoff_ms))
}
