//! Event types for the clickstream
//!
//! A [`RawEvent`] is whatever the decoder produced from one inbound payload:
//! an unordered JSON object with no schema attached. Classification looks at a
//! single field, `event`, and maps it to an [`EventKind`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Name of the field carrying the event type
pub const EVENT_FIELD: &str = "event";

/// Kind of interaction event
///
/// The three routed kinds compare against distinct literals, so an event can
/// match at most one of them. Anything else is [`EventKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Product detail page view (`view_item`)
    View,
    /// Item added to the cart (`add_to_cart`)
    CartAdd,
    /// Completed purchase (`purchase`)
    Purchase,
    /// Any other or missing event type
    Other,
}

impl EventKind {
    pub const VIEW_ITEM: &'static str = "view_item";
    pub const ADD_TO_CART: &'static str = "add_to_cart";
    pub const PURCHASE: &'static str = "purchase";

    /// Map an `event` field value to its kind (exact, case-sensitive match)
    pub fn from_event_name(name: &str) -> Self {
        match name {
            Self::VIEW_ITEM => EventKind::View,
            Self::ADD_TO_CART => EventKind::CartAdd,
            Self::PURCHASE => EventKind::Purchase,
            _ => EventKind::Other,
        }
    }

    /// The literal `event` value for this kind, if it is a routed kind
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            EventKind::View => Some(Self::VIEW_ITEM),
            EventKind::CartAdd => Some(Self::ADD_TO_CART),
            EventKind::Purchase => Some(Self::PURCHASE),
            EventKind::Other => None,
        }
    }

    /// Whether events of this kind continue down one of the three paths
    pub fn is_routed(&self) -> bool {
        !matches!(self, EventKind::Other)
    }

    /// Short label used in logs and metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::View => "view",
            EventKind::CartAdd => "cart_add",
            EventKind::Purchase => "purchase",
            EventKind::Other => "other",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// A decoded but unvalidated event
///
/// Field access is by name only; nothing is assumed about which fields exist
/// until a projector asks for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent {
    fields: Map<String, Value>,
}

impl RawEvent {
    /// Create a raw event from a JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Get a top-level field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Value of the `event` field when it is a string
    pub fn event_name(&self) -> Option<&str> {
        self.fields.get(EVENT_FIELD).and_then(Value::as_str)
    }

    /// All fields of the event
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the event and return its fields
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the event has no fields at all
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for RawEvent {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> RawEvent {
        match value {
            Value::Object(map) => RawEvent::new(map),
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_event_kind_from_name() {
        assert_eq!(EventKind::from_event_name("view_item"), EventKind::View);
        assert_eq!(EventKind::from_event_name("add_to_cart"), EventKind::CartAdd);
        assert_eq!(EventKind::from_event_name("purchase"), EventKind::Purchase);
        assert_eq!(EventKind::from_event_name("Purchase"), EventKind::Other);
        assert_eq!(EventKind::from_event_name("begin_checkout"), EventKind::Other);
        assert_eq!(EventKind::from_event_name(""), EventKind::Other);
    }

    #[test]
    fn test_event_kind_names_round_trip() {
        for kind in [EventKind::View, EventKind::CartAdd, EventKind::Purchase] {
            let name = kind.event_name().unwrap();
            assert_eq!(EventKind::from_event_name(name), kind);
            assert!(kind.is_routed());
        }
        assert_eq!(EventKind::Other.event_name(), None);
        assert!(!EventKind::Other.is_routed());
    }

    #[test]
    fn test_raw_event_accessors() {
        let raw = event(json!({"event": "purchase", "user_id": "UID00001"}));
        assert_eq!(raw.event_name(), Some("purchase"));
        assert_eq!(raw.get("user_id"), Some(&json!("UID00001")));
        assert_eq!(raw.len(), 2);
        assert!(!raw.is_empty());

        let raw = event(json!({"event": 7}));
        assert_eq!(raw.event_name(), None);
    }

    #[test]
    fn test_raw_event_serializes_transparently() {
        let raw = event(json!({"event": "view_item", "page": "/p/1"}));
        let text = serde_json::to_string(&raw).unwrap();
        let back: RawEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(raw, back);
        assert!(text.starts_with('{'));
    }
}
