//! Event routing by event name

use retail_types::{EventKind, RawEvent};

/// An event together with the path it was routed to
#[derive(Debug, Clone, Copy)]
pub struct Classified<'a> {
    pub kind: EventKind,
    pub event: &'a RawEvent,
}

impl<'a> Classified<'a> {
    pub fn is_routed(&self) -> bool {
        self.kind.is_routed()
    }
}

/// Classify an event by exact match on its `event` field
///
/// Missing or non-string names classify as [`EventKind::Other`].
pub fn classify(event: &RawEvent) -> EventKind {
    event
        .event_name()
        .map(EventKind::from_event_name)
        .unwrap_or(EventKind::Other)
}

/// Classify without copying the event
pub fn route(event: &RawEvent) -> Classified<'_> {
    Classified {
        kind: classify(event),
        event,
    }
}
