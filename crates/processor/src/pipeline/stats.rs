use crate::metrics::{PipelineMetrics, ResultLabel};
use crate::sink::Destination;
use retail_types::EventKind;
use serde::{Deserialize, Serialize};

/// Point-in-time statistics of a running pipeline
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Payloads received
    pub events_received: u64,

    /// Events routed to the view path
    pub views: u64,

    /// Events routed to the add-to-cart path
    pub cart_adds: u64,

    /// Events routed to the purchase path
    pub purchases: u64,

    /// Payloads dropped as malformed
    pub decode_failures: u64,

    /// Events dropped because no route matched
    pub unclassified: u64,

    /// Events dropped during projection or purchase extraction
    pub projection_failures: u64,

    /// Purchase values merged into the sums
    pub purchases_merged: u64,

    /// Trigger firings
    pub trigger_firings: u64,

    /// Aggregate rows emitted across all firings
    pub aggregate_rows_emitted: u64,

    /// Rows appended, across destinations
    pub rows_written: u64,

    /// Rows that failed to append, across destinations
    pub write_failures: u64,

    /// Rows refused because their destination writer halted
    pub halted_drops: u64,

    /// Users holding a running sum
    pub active_keys: u64,
}

impl PipelineStats {
    /// Read the current values of the pipeline metrics
    pub fn from_metrics(metrics: &PipelineMetrics) -> Self {
        let writes = |result: ResultLabel| -> u64 {
            Destination::ALL
                .iter()
                .map(|d| metrics.writes(*d, result))
                .sum()
        };

        Self {
            events_received: metrics.events_received.get(),
            views: metrics.classified(EventKind::View),
            cart_adds: metrics.classified(EventKind::CartAdd),
            purchases: metrics.classified(EventKind::Purchase),
            decode_failures: metrics.decode_failures.get(),
            unclassified: metrics.unclassified_events.get(),
            projection_failures: metrics.projection_failures_total(),
            purchases_merged: metrics.purchases_merged.get(),
            trigger_firings: metrics.trigger_firings.get(),
            aggregate_rows_emitted: metrics.aggregate_rows_emitted.get(),
            rows_written: writes(ResultLabel::Success),
            write_failures: writes(ResultLabel::Error),
            halted_drops: Destination::ALL
                .iter()
                .map(|d| metrics.halted_drops(*d))
                .sum(),
            active_keys: metrics.active_keys.get().max(0) as u64,
        }
    }

    /// Events dropped for any per-event reason
    pub fn events_dropped(&self) -> u64 {
        self.decode_failures + self.unclassified + self.projection_failures + self.halted_drops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_from_metrics() {
        let metrics = PipelineMetrics::new();
        metrics.record_received();
        metrics.record_received();
        metrics.record_decode_failure();
        metrics.record_classified(EventKind::View);
        metrics.record_write(Destination::ItemViews, ResultLabel::Success);
        metrics.record_write(Destination::Aggregates, ResultLabel::Error);

        let stats = PipelineStats::from_metrics(&metrics);
        assert_eq!(stats.events_received, 2);
        assert_eq!(stats.views, 1);
        assert_eq!(stats.rows_written, 1);
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.events_dropped(), 1);

        metrics.record_halted_drop(Destination::AddToCarts);
        let stats = PipelineStats::from_metrics(&metrics);
        assert_eq!(stats.halted_drops, 1);
        assert_eq!(stats.events_dropped(), 2);
    }
}
