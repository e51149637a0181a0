//! Counters and gauges for the clickstream pipeline

use super::labels::{DestinationLabels, ErrorLabels, KindLabels, ResultLabel, WriteLabels};
use super::registry::MetricsRegistry;
use crate::sink::Destination;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use retail_types::EventKind;

/// Metrics recorded by the executor, the aggregation worker and the
/// destination writers
///
/// Cloning is cheap; clones share the underlying counters.
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    pub events_received: Counter,
    pub events_classified: Family<KindLabels, Counter>,
    pub decode_failures: Counter,
    pub unclassified_events: Counter,
    pub projection_failures: Family<ErrorLabels, Counter>,
    pub purchases_merged: Counter,
    pub trigger_firings: Counter,
    pub aggregate_rows_emitted: Counter,
    pub sink_writes: Family<WriteLabels, Counter>,
    pub sink_retries: Family<DestinationLabels, Counter>,
    pub sink_halts: Family<DestinationLabels, Counter>,
    pub halted_drops: Family<DestinationLabels, Counter>,
    pub active_keys: Gauge,
}

impl PipelineMetrics {
    /// Create unregistered metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Create metrics registered in the given registry
    pub fn registered(registry: &MetricsRegistry) -> Self {
        let metrics = Self::new();
        metrics.register(&mut registry.registry().write());
        metrics
    }

    /// Register every metric
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "events_received",
            "Payloads received from upstream",
            self.events_received.clone(),
        );
        registry.register(
            "events_classified",
            "Events by classified kind",
            self.events_classified.clone(),
        );
        registry.register(
            "decode_failures",
            "Payloads dropped as malformed",
            self.decode_failures.clone(),
        );
        registry.register(
            "unclassified_events",
            "Events dropped because no route matched",
            self.unclassified_events.clone(),
        );
        registry.register(
            "projection_failures",
            "Events dropped during projection, by error type",
            self.projection_failures.clone(),
        );
        registry.register(
            "purchases_merged",
            "Purchase values merged into the running sums",
            self.purchases_merged.clone(),
        );
        registry.register(
            "trigger_firings",
            "Firings of the purchase count trigger",
            self.trigger_firings.clone(),
        );
        registry.register(
            "aggregate_rows_emitted",
            "Aggregate rows handed to the aggregate destination",
            self.aggregate_rows_emitted.clone(),
        );
        registry.register(
            "sink_writes",
            "Destination appends by result",
            self.sink_writes.clone(),
        );
        registry.register(
            "sink_retries",
            "Destination append retries",
            self.sink_retries.clone(),
        );
        registry.register(
            "sink_halts",
            "Destination writers halted on a permanent failure",
            self.sink_halts.clone(),
        );
        registry.register(
            "halted_drops",
            "Rows refused because their destination writer halted",
            self.halted_drops.clone(),
        );
        registry.register(
            "active_keys",
            "Users with a running purchase sum",
            self.active_keys.clone(),
        );
    }

    pub fn record_received(&self) {
        self.events_received.inc();
    }

    pub fn record_classified(&self, kind: EventKind) {
        self.events_classified
            .get_or_create(&KindLabels::new(kind))
            .inc();
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.inc();
    }

    pub fn record_unclassified(&self) {
        self.unclassified_events.inc();
    }

    pub fn record_projection_failure(&self, error_type: &str) {
        self.projection_failures
            .get_or_create(&ErrorLabels::new(error_type))
            .inc();
    }

    pub fn record_merge(&self, active_keys: usize) {
        self.purchases_merged.inc();
        self.active_keys.set(active_keys as i64);
    }

    pub fn record_firing(&self, rows: usize) {
        self.trigger_firings.inc();
        self.aggregate_rows_emitted.inc_by(rows as u64);
    }

    pub fn record_write(&self, destination: Destination, result: ResultLabel) {
        self.sink_writes
            .get_or_create(&WriteLabels::new(destination, result))
            .inc();
    }

    pub fn record_retry(&self, destination: Destination) {
        self.sink_retries
            .get_or_create(&DestinationLabels::new(destination))
            .inc();
    }

    pub fn record_halt(&self, destination: Destination) {
        self.sink_halts
            .get_or_create(&DestinationLabels::new(destination))
            .inc();
    }

    /// Count a row refused by a halted writer; returns the new total
    pub fn record_halted_drop(&self, destination: Destination) -> u64 {
        self.halted_drops
            .get_or_create(&DestinationLabels::new(destination))
            .inc()
            + 1
    }

    /// Rows refused by the halted writer of `destination`
    pub fn halted_drops(&self, destination: Destination) -> u64 {
        self.halted_drops
            .get_or_create(&DestinationLabels::new(destination))
            .get()
    }

    /// Count of events classified as `kind`
    pub fn classified(&self, kind: EventKind) -> u64 {
        self.events_classified
            .get_or_create(&KindLabels::new(kind))
            .get()
    }

    /// Total projection failures across error types
    pub fn projection_failures_total(&self) -> u64 {
        ["missing_field", "empty_items_list", "invalid_field_type"]
            .iter()
            .map(|error_type| {
                self.projection_failures
                    .get_or_create(&ErrorLabels::new(*error_type))
                    .get()
            })
            .sum()
    }

    /// Appends to `destination` with the given result
    pub fn writes(&self, destination: Destination, result: ResultLabel) -> u64 {
        self.sink_writes
            .get_or_create(&WriteLabels::new(destination, result))
            .get()
    }

    pub fn retries(&self, destination: Destination) -> u64 {
        self.sink_retries
            .get_or_create(&DestinationLabels::new(destination))
            .get()
    }
}
