//! Windowing for the purchase aggregation path
//!
//! Purchases are assigned to a single global window that is opened on the
//! first element and never closed. A repeating [`CountTrigger`] fires every
//! `threshold` elements; whether the window contents survive a firing is
//! controlled by the [`AccumulationMode`](crate::config::AccumulationMode).
//!
//! ```text
//! Elements: 1 2 3 ... 10 11 ... 20 21 ...
//! Fires:               ^         ^
//! ```
//!
//! Without a watermark or window end, elements that arrive after the last
//! firing stay in the window until the next multiple of the threshold.

pub mod assigner;
pub mod trigger;
pub mod types;

pub use assigner::{GlobalWindowAssigner, WindowAssigner};
pub use trigger::{CountTrigger, TriggerContext, TriggerResult, WindowTrigger};
pub use types::{Window, GLOBAL_WINDOW_ID};
