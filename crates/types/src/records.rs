//! Flat records written to the destinations

use crate::schema::TableRow;
use serde::{Deserialize, Serialize};

/// An item view or add-to-cart event reshaped into the warehouse columns
///
/// The first six fields come from the top level of the event, the rest from
/// the first entry of `ecommerce.items`. All values are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedRecord {
    pub event_datetime: String,
    pub event: String,
    pub user_id: String,
    pub client_id: String,
    pub page: String,
    pub page_previous: String,
    pub item_name: String,
    pub item_id: String,
    pub price: String,
    pub item_brand: String,
    pub item_category: String,
    pub item_category_2: String,
    pub item_category_3: String,
    pub item_category_4: String,
    pub item_variant: String,
    pub item_list_name: String,
    pub item_list_id: String,
    pub quantity: String,
}

impl ProjectedRecord {
    /// Column names in table order
    pub const COLUMNS: [&'static str; 18] = [
        "event_datetime",
        "event",
        "user_id",
        "client_id",
        "page",
        "page_previous",
        "item_name",
        "item_id",
        "price",
        "item_brand",
        "item_category",
        "item_category_2",
        "item_category_3",
        "item_category_4",
        "item_variant",
        "item_list_name",
        "item_list_id",
        "quantity",
    ];

    /// Values in table order
    pub fn values(&self) -> [&str; 18] {
        [
            &self.event_datetime,
            &self.event,
            &self.user_id,
            &self.client_id,
            &self.page,
            &self.page_previous,
            &self.item_name,
            &self.item_id,
            &self.price,
            &self.item_brand,
            &self.item_category,
            &self.item_category_2,
            &self.item_category_3,
            &self.item_category_4,
            &self.item_variant,
            &self.item_list_name,
            &self.item_list_id,
            &self.quantity,
        ]
    }

    pub fn to_row(&self) -> TableRow {
        Self::COLUMNS
            .iter()
            .zip(self.values())
            .fold(TableRow::new(), |row, (column, value)| row.with(*column, value))
    }
}

/// The `(user, value)` pair a purchase contributes to the running sums
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseValue {
    pub user_id: String,
    pub value: f64,
}

impl PurchaseValue {
    pub fn new(user_id: impl Into<String>, value: f64) -> Self {
        Self {
            user_id: user_id.into(),
            value,
        }
    }
}

/// One row of the aggregate table: a user's summed purchase value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub user_id: String,
    pub summed_value: f64,
}

impl AggregateRecord {
    pub fn new(user_id: impl Into<String>, summed_value: f64) -> Self {
        Self {
            user_id: user_id.into(),
            summed_value,
        }
    }

    pub fn to_row(&self) -> TableRow {
        TableRow::new()
            .with("user_id", self.user_id.as_str())
            .with("summed_value", self.summed_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableSchema;

    fn sample_record() -> ProjectedRecord {
        ProjectedRecord {
            event_datetime: "2023-05-01 12:00:00".to_string(),
            event: "view_item".to_string(),
            user_id: "UID00001".to_string(),
            client_id: "CID-1".to_string(),
            page: "/product/42".to_string(),
            page_previous: "/".to_string(),
            item_name: "Shoe".to_string(),
            item_id: "SKU-42".to_string(),
            price: "59.99".to_string(),
            item_brand: "Acme".to_string(),
            item_category: "Apparel".to_string(),
            item_category_2: "Footwear".to_string(),
            item_category_3: "Running".to_string(),
            item_category_4: "Men".to_string(),
            item_variant: "red".to_string(),
            item_list_name: "Search".to_string(),
            item_list_id: "SR-1".to_string(),
            quantity: "1".to_string(),
        }
    }

    #[test]
    fn test_projected_record_row_matches_schema() {
        let record = sample_record();
        let row = record.to_row();
        assert_eq!(row.len(), 18);
        assert!(TableSchema::projected_event().validate_row(&row).is_ok());
        assert_eq!(row.get("item_category_3").and_then(|v| v.as_str()), Some("Running"));
    }

    #[test]
    fn test_aggregate_record_row_matches_schema() {
        let row = AggregateRecord::new("A", 50.0).to_row();
        assert!(TableSchema::aggregate().validate_row(&row).is_ok());
    }

    #[test]
    fn test_projected_record_json_shape() {
        let record = sample_record();
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 18);
        for column in ProjectedRecord::COLUMNS {
            assert!(object.contains_key(column), "missing {column}");
        }
    }
}
