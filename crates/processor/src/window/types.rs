//! Window types
//!
//! The purchase path uses a single global window: it has no end, is never
//! closed, and collects every purchase seen by the process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the global window
pub const GLOBAL_WINDOW_ID: &str = "global";

/// A window in the aggregation pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Window identifier for tracking
    pub id: String,
    /// Processing time of the first element assigned to the window
    pub opened_at: DateTime<Utc>,
}

impl Window {
    /// The unbounded global window
    pub fn global(opened_at: DateTime<Utc>) -> Self {
        Self {
            id: GLOBAL_WINDOW_ID.to_string(),
            opened_at,
        }
    }

    pub fn is_global(&self) -> bool {
        self.id == GLOBAL_WINDOW_ID
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} - ∞)",
            self.id,
            self.opened_at.format("%Y-%m-%d %H:%M:%S%.3f")
        )
    }
}
