//! Window triggers
//!
//! Triggers decide when the contents of a window are emitted. The purchase
//! path uses a repeating count trigger: it fires every time the element
//! counter reaches a multiple of the threshold and never closes the window.

use super::types::Window;
use crate::config::AccumulationMode;
use crate::error::WindowError;
use chrono::{DateTime, Utc};
use std::fmt;

/// Result of trigger evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerResult {
    /// Continue processing, don't fire
    Continue,
    /// Fire the window and keep its state
    Fire,
    /// Fire the window and purge its state
    FireAndPurge,
}

impl TriggerResult {
    pub fn is_fire(&self) -> bool {
        !matches!(self, TriggerResult::Continue)
    }
}

/// Context provided to triggers for evaluation
#[derive(Debug, Clone)]
pub struct TriggerContext {
    /// The window being evaluated
    pub window: Window,
    /// Current processing time
    pub processing_time: DateTime<Utc>,
    /// Elements assigned to the window so far, including the current one
    pub element_count: u64,
}

/// Trait for window triggers
pub trait WindowTrigger: Send + Sync + fmt::Debug {
    /// Evaluate when an element is added to the window
    fn on_element(&mut self, ctx: &TriggerContext) -> TriggerResult;

    /// Clear any state associated with the window
    fn clear(&mut self, window: &Window) {
        let _ = window;
    }
}

/// Trigger that fires every `threshold` elements
///
/// The element count is owned by the caller and passed in the context, so
/// the trigger itself holds no per-window state. In accumulating mode a
/// firing keeps the window contents; in discarding mode it purges them.
#[derive(Debug, Clone)]
pub struct CountTrigger {
    threshold: u64,
    mode: AccumulationMode,
}

impl CountTrigger {
    pub fn new(threshold: u64) -> Result<Self, WindowError> {
        Self::with_mode(threshold, AccumulationMode::Accumulating)
    }

    pub fn with_mode(threshold: u64, mode: AccumulationMode) -> Result<Self, WindowError> {
        if threshold == 0 {
            return Err(WindowError::InvalidTriggerCount { count: threshold });
        }
        Ok(Self { threshold, mode })
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn mode(&self) -> AccumulationMode {
        self.mode
    }
}

impl WindowTrigger for CountTrigger {
    fn on_element(&mut self, ctx: &TriggerContext) -> TriggerResult {
        if ctx.element_count == 0 || ctx.element_count % self.threshold != 0 {
            return TriggerResult::Continue;
        }

        match self.mode {
            AccumulationMode::Accumulating => TriggerResult::Fire,
            AccumulationMode::Discarding => TriggerResult::FireAndPurge,
        }
    }
}
