//! Windowed, triggered aggregation of purchase values
//!
//! [`TriggeredAggregation`] ties the global window, the repeating count
//! trigger and the keyed combiner together. It is a plain state machine with
//! no terminal state:
//!
//! ```text
//!            purchase                 purchase
//!   Idle ─────────────▶ Accumulating ◀────────┐
//!    ▲                       │                │
//!    │ fire + purge          └── count % n ───┘ (fire, keep sums)
//!    └───────────────────────────┘ (discarding mode only)
//! ```

use crate::aggregation::KeyedCombiner;
use crate::config::AccumulationMode;
use crate::error::{AggregationResult, WindowError};
use crate::format::format_rows;
use crate::window::{
    CountTrigger, GlobalWindowAssigner, TriggerContext, TriggerResult, Window, WindowAssigner,
    WindowTrigger,
};
use chrono::Utc;
use retail_types::{AggregateRecord, PurchaseValue};

/// Lifecycle phase of the aggregation window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    /// No element since start (or since the last purge)
    Idle,
    /// At least one element is held in the window
    Accumulating,
}

/// Output of one trigger firing
#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    pub window: Window,
    /// 1-based firing number
    pub sequence: u64,
    /// Element count at the time of firing
    pub element_count: u64,
    /// Whether the sums were cleared after this firing
    pub purged: bool,
    /// One row per key, ordered by key
    pub rows: Vec<AggregateRecord>,
}

/// Global window + repeating count trigger + per-user sums
#[derive(Debug)]
pub struct TriggeredAggregation {
    /// Opened on the first purchase
    assigner: Option<GlobalWindowAssigner>,
    trigger: Box<dyn WindowTrigger>,
    combiner: KeyedCombiner,
    phase: WindowPhase,
    element_count: u64,
    firings: u64,
}

impl TriggeredAggregation {
    /// Fire every `threshold` purchases
    pub fn new(threshold: u64, mode: AccumulationMode) -> Result<Self, WindowError> {
        let trigger = CountTrigger::with_mode(threshold, mode)?;
        Ok(Self::with_trigger(Box::new(trigger)))
    }

    pub fn with_trigger(trigger: Box<dyn WindowTrigger>) -> Self {
        Self {
            assigner: None,
            trigger,
            combiner: KeyedCombiner::new(),
            phase: WindowPhase::Idle,
            element_count: 0,
            firings: 0,
        }
    }

    /// Merge one purchase and evaluate the trigger
    ///
    /// Merge, counter increment and trigger check happen together; a value
    /// that cannot be merged leaves the state untouched.
    pub fn on_purchase(&mut self, purchase: &PurchaseValue) -> AggregationResult<Option<Firing>> {
        let now = Utc::now();

        self.combiner.merge(&purchase.user_id, purchase.value)?;
        self.element_count += 1;
        self.phase = WindowPhase::Accumulating;

        let windows = self
            .assigner
            .get_or_insert_with(|| GlobalWindowAssigner::opened_at(now))
            .assign_windows(now);

        let mut firing = None;
        for window in windows {
            let ctx = TriggerContext {
                window,
                processing_time: now,
                element_count: self.element_count,
            };

            match self.trigger.on_element(&ctx) {
                TriggerResult::Continue => {}
                TriggerResult::Fire => firing = Some(self.fire(ctx.window, false)),
                TriggerResult::FireAndPurge => firing = Some(self.fire(ctx.window, true)),
            }
        }

        Ok(firing)
    }

    fn fire(&mut self, window: Window, purge: bool) -> Firing {
        self.firings += 1;
        let rows = format_rows(self.combiner.snapshot());

        if purge {
            self.combiner.clear();
            self.trigger.clear(&window);
            self.phase = WindowPhase::Idle;
        }

        Firing {
            window,
            sequence: self.firings,
            element_count: self.element_count,
            purged: purge,
            rows,
        }
    }

    /// The global window, once the first purchase has opened it
    pub fn window(&self) -> Option<Window> {
        self.assigner
            .as_ref()
            .and_then(|a| a.assign_windows(Utc::now()).into_iter().next())
    }

    pub fn phase(&self) -> WindowPhase {
        self.phase
    }

    /// Purchases merged since start
    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    pub fn firings(&self) -> u64 {
        self.firings
    }

    /// Users currently holding a sum
    pub fn active_keys(&self) -> usize {
        self.combiner.len()
    }

    /// Current sums, without firing
    pub fn snapshot(&self) -> Vec<AggregateRecord> {
        format_rows(self.combiner.snapshot())
    }
}
