//! Window assigners

use super::types::Window;
use chrono::{DateTime, Utc};
use std::fmt;

/// Trait for assigning elements to windows
pub trait WindowAssigner: Send + Sync + fmt::Debug {
    /// Assign an element observed at `timestamp` to one or more windows
    fn assign_windows(&self, timestamp: DateTime<Utc>) -> Vec<Window>;
}

/// Global window assigner
///
/// Every element lands in the same window. The window never ends; its open
/// time is supplied by the owner, normally the processing time of the first
/// element.
#[derive(Debug, Clone)]
pub struct GlobalWindowAssigner {
    window: Window,
}

impl GlobalWindowAssigner {
    pub fn opened_at(opened_at: DateTime<Utc>) -> Self {
        Self {
            window: Window::global(opened_at),
        }
    }
}

impl WindowAssigner for GlobalWindowAssigner {
    fn assign_windows(&self, _timestamp: DateTime<Utc>) -> Vec<Window> {
        vec![self.window.clone()]
    }
}
