//! Reshaping events into flat records
//!
//! View and add-to-cart events become a [`ProjectedRecord`]: six top-level
//! fields plus twelve fields of the first entry of `ecommerce.items`. Purchase
//! events contribute a [`PurchaseValue`] to the running sums.
//!
//! A JSON `null` is treated as an absent field. Strings are copied as-is,
//! numbers and booleans as their JSON text. Objects and arrays are rejected
//! where a scalar is expected.

use crate::decode::json_kind;
use crate::error::{ProjectionError, ProjectionResult};
use retail_types::{ProjectedRecord, PurchaseValue, RawEvent};
use serde_json::{Map, Value};

const ECOMMERCE: &str = "ecommerce";
const ITEMS: &str = "items";
const PURCHASE: &str = "purchase";
const VALUE: &str = "value";
const USER_ID: &str = "user_id";

/// Projects view and add-to-cart events into table records
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordProjector;

impl RecordProjector {
    pub fn new() -> Self {
        Self
    }

    /// Project an event into the 18-column record
    pub fn project(&self, event: &RawEvent) -> ProjectionResult<ProjectedRecord> {
        let item = first_item(event)?;
        let top = |field: &str| text_field(event.fields(), field, field);
        let item_field = |field: &str| {
            text_field(item, field, &format!("{}.{}[0].{}", ECOMMERCE, ITEMS, field))
        };

        Ok(ProjectedRecord {
            event_datetime: top("event_datetime")?,
            event: top("event")?,
            user_id: top("user_id")?,
            client_id: top("client_id")?,
            page: top("page")?,
            page_previous: top("page_previous")?,
            item_name: item_field("item_name")?,
            item_id: item_field("item_id")?,
            price: item_field("price")?,
            item_brand: item_field("item_brand")?,
            item_category: item_field("item_category")?,
            item_category_2: item_field("item_category_2")?,
            item_category_3: item_field("item_category_3")?,
            item_category_4: item_field("item_category_4")?,
            item_variant: item_field("item_variant")?,
            item_list_name: item_field("item_list_name")?,
            item_list_id: item_field("item_list_id")?,
            quantity: item_field("quantity")?,
        })
    }

    /// Extract `(user_id, ecommerce.purchase.value)` from a purchase event
    ///
    /// The value may be a JSON number or a numeric string. It must be finite
    /// and non-negative so the running sums never decrease.
    pub fn extract_purchase(&self, event: &RawEvent) -> ProjectionResult<PurchaseValue> {
        let user_id = text_field(event.fields(), USER_ID, USER_ID)?;

        let path = format!("{}.{}.{}", ECOMMERCE, PURCHASE, VALUE);
        let purchase = object_field(event.fields(), ECOMMERCE, ECOMMERCE)?;
        let purchase = object_field(purchase, PURCHASE, &format!("{}.{}", ECOMMERCE, PURCHASE))?;

        let value = match present(purchase, VALUE) {
            None => return Err(ProjectionError::missing(path)),
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| ProjectionError::invalid(path.clone(), "a finite number"))?,
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| ProjectionError::invalid(path.clone(), "a number"))?,
            Some(_) => return Err(ProjectionError::invalid(path, "a number")),
        };

        if !value.is_finite() || value < 0.0 {
            return Err(ProjectionError::invalid(path, "a finite non-negative number"));
        }

        Ok(PurchaseValue::new(user_id, value))
    }
}

fn first_item(event: &RawEvent) -> ProjectionResult<&Map<String, Value>> {
    let ecommerce = object_field(event.fields(), ECOMMERCE, ECOMMERCE)?;
    let items_path = format!("{}.{}", ECOMMERCE, ITEMS);

    let items = match present(ecommerce, ITEMS) {
        None => return Err(ProjectionError::missing(items_path)),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ProjectionError::invalid(items_path, "an array")),
    };

    match items.first() {
        None => Err(ProjectionError::EmptyItemsList),
        Some(Value::Object(item)) => Ok(item),
        Some(Value::Null) => Err(ProjectionError::missing(format!("{}[0]", items_path))),
        Some(_) => Err(ProjectionError::invalid(
            format!("{}[0]", items_path),
            "an object",
        )),
    }
}

/// Field value, with `null` treated as absent
fn present<'a>(fields: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    fields.get(field).filter(|v| !v.is_null())
}

fn object_field<'a>(
    fields: &'a Map<String, Value>,
    field: &str,
    path: &str,
) -> ProjectionResult<&'a Map<String, Value>> {
    match present(fields, field) {
        None => Err(ProjectionError::missing(path)),
        Some(Value::Object(inner)) => Ok(inner),
        Some(_) => Err(ProjectionError::invalid(path, "an object")),
    }
}

fn text_field(fields: &Map<String, Value>, field: &str, path: &str) -> ProjectionResult<String> {
    match present(fields, field) {
        None => Err(ProjectionError::missing(path)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(value @ (Value::Number(_) | Value::Bool(_))) => Ok(value.to_string()),
        Some(other) => {
            tracing::trace!(field = path, found = json_kind(other), "structured value in scalar field");
            Err(ProjectionError::invalid(path, "a scalar"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> RawEvent {
        match value {
            Value::Object(fields) => RawEvent::new(fields),
            _ => panic!("test events must be objects"),
        }
    }

    fn view_event() -> Value {
        json!({
            "event_datetime": "2023-05-01 12:00:00",
            "event": "view_item",
            "user_id": "UID00001",
            "client_id": "CID-1",
            "page": "/product/42",
            "page_previous": "/",
            "ecommerce": {
                "items": [
                    {
                        "item_name": "Shoe",
                        "item_id": "SKU-42",
                        "price": 59.99,
                        "item_brand": "Acme",
                        "item_category": "Apparel",
                        "item_category_2": "Footwear",
                        "item_category_3": "Running",
                        "item_category_4": "Men",
                        "item_variant": "red",
                        "item_list_name": "Search",
                        "item_list_id": "SR-1",
                        "quantity": 1
                    },
                    {
                        "item_name": "Sock"
                    }
                ]
            }
        })
    }

    #[test]
    fn test_project_copies_fields_verbatim() {
        let record = RecordProjector::new().project(&event(view_event())).unwrap();
        assert_eq!(record.event_datetime, "2023-05-01 12:00:00");
        assert_eq!(record.event, "view_item");
        assert_eq!(record.page_previous, "/");
        assert_eq!(record.item_name, "Shoe");
        assert_eq!(record.price, "59.99");
        assert_eq!(record.quantity, "1");
        assert_eq!(record.item_category_4, "Men");
    }

    #[test]
    fn test_project_ignores_extra_items_and_fields() {
        let mut raw = view_event();
        raw["extra"] = json!({"nested": true});
        let record = RecordProjector::new().project(&event(raw)).unwrap();
        assert_eq!(record.item_id, "SKU-42");
    }

    #[test]
    fn test_missing_item_category_3() {
        let mut raw = view_event();
        raw["ecommerce"]["items"][0]
            .as_object_mut()
            .unwrap()
            .remove("item_category_3");

        let err = RecordProjector::new().project(&event(raw)).unwrap_err();
        assert_eq!(
            err,
            ProjectionError::missing("ecommerce.items[0].item_category_3")
        );
    }

    #[test]
    fn test_null_counts_as_missing() {
        let mut raw = view_event();
        raw["page_previous"] = Value::Null;
        let err = RecordProjector::new().project(&event(raw)).unwrap_err();
        assert_eq!(err, ProjectionError::missing("page_previous"));
    }

    #[test]
    fn test_empty_items_list() {
        let mut raw = view_event();
        raw["ecommerce"]["items"] = json!([]);
        let err = RecordProjector::new().project(&event(raw)).unwrap_err();
        assert_eq!(err, ProjectionError::EmptyItemsList);
    }

    #[test]
    fn test_missing_ecommerce() {
        let mut raw = view_event();
        raw.as_object_mut().unwrap().remove("ecommerce");
        let err = RecordProjector::new().project(&event(raw)).unwrap_err();
        assert_eq!(err, ProjectionError::missing("ecommerce"));
    }

    #[test]
    fn test_structured_value_is_invalid() {
        let mut raw = view_event();
        raw["page"] = json!({"path": "/"});
        let err = RecordProjector::new().project(&event(raw)).unwrap_err();
        assert!(matches!(err, ProjectionError::InvalidFieldType { ref field, .. } if field == "page"));

        let mut raw = view_event();
        raw["ecommerce"]["items"] = json!({"item_name": "Shoe"});
        let err = RecordProjector::new().project(&event(raw)).unwrap_err();
        assert_eq!(err.error_type(), "invalid_field_type");
    }

    #[test]
    fn test_extract_purchase_number_and_string() {
        let projector = RecordProjector::new();
        let p = projector
            .extract_purchase(&event(json!({
                "event": "purchase",
                "user_id": "A",
                "ecommerce": {"purchase": {"value": 10}}
            })))
            .unwrap();
        assert_eq!(p, PurchaseValue::new("A", 10.0));

        let p = projector
            .extract_purchase(&event(json!({
                "event": "purchase",
                "user_id": "B",
                "ecommerce": {"purchase": {"value": " 12.5 "}}
            })))
            .unwrap();
        assert_eq!(p.value, 12.5);
    }

    #[test]
    fn test_extract_purchase_failures() {
        let projector = RecordProjector::new();

        let err = projector
            .extract_purchase(&event(json!({"event": "purchase", "user_id": "A"})))
            .unwrap_err();
        assert_eq!(err, ProjectionError::missing("ecommerce"));

        let err = projector
            .extract_purchase(&event(json!({
                "event": "purchase",
                "ecommerce": {"purchase": {"value": 1}}
            })))
            .unwrap_err();
        assert_eq!(err, ProjectionError::missing("user_id"));

        let err = projector
            .extract_purchase(&event(json!({
                "event": "purchase",
                "user_id": "A",
                "ecommerce": {"purchase": {"value": null}}
            })))
            .unwrap_err();
        assert_eq!(err, ProjectionError::missing("ecommerce.purchase.value"));

        for bad in [json!("ten"), json!("NaN"), json!(-3.0), json!([1])] {
            let err = projector
                .extract_purchase(&event(json!({
                    "event": "purchase",
                    "user_id": "A",
                    "ecommerce": {"purchase": {"value": bad}}
                })))
                .unwrap_err();
            assert_eq!(err.error_type(), "invalid_field_type");
        }
    }
}
