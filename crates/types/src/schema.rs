//! Table schemas for the warehouse destinations
//!
//! Schemas use the compact `name:TYPE, name:TYPE` notation, for example
//! `user_id:STRING, summed_value:FLOAT`. Rows are checked against a schema
//! before they are appended to a destination.

use crate::errors::{Result, SchemaError};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Column type of a destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    /// Datetime-like text, e.g. `2023-05-01 12:30:00`
    Datetime,
    /// Free text
    String,
    /// Double-precision number
    Float,
}

impl ColumnType {
    /// Whether a cell value can be stored in a column of this type
    pub fn accepts(&self, value: &CellValue) -> bool {
        matches!(
            (self, value),
            (ColumnType::Datetime, CellValue::String(_))
                | (ColumnType::String, CellValue::String(_))
                | (ColumnType::Float, CellValue::Float(_))
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Datetime => write!(f, "DATETIME"),
            ColumnType::String => write!(f, "STRING"),
            ColumnType::Float => write!(f, "FLOAT"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DATETIME" => Ok(ColumnType::Datetime),
            "STRING" => Ok(ColumnType::String),
            "FLOAT" | "FLOAT64" => Ok(ColumnType::Float),
            other => Err(other.to_string()),
        }
    }
}

/// A single named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.column_type)
    }
}

/// Ordered list of columns of a destination table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Create a schema, rejecting empty or duplicate column lists
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }
        }

        Ok(Self { columns })
    }

    /// Parse a `name:TYPE, name:TYPE` schema string
    pub fn parse(spec: &str) -> Result<Self> {
        let mut columns = Vec::new();

        for definition in spec.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let (name, type_name) = definition
                .split_once(':')
                .map(|(n, t)| (n.trim(), t.trim()))
                .filter(|(n, t)| !n.is_empty() && !t.is_empty())
                .ok_or_else(|| SchemaError::InvalidColumn {
                    definition: definition.to_string(),
                })?;

            let column_type = type_name
                .parse::<ColumnType>()
                .map_err(|type_name| SchemaError::UnknownType {
                    column: name.to_string(),
                    type_name,
                })?;

            columns.push(ColumnSpec::new(name, column_type));
        }

        Self::new(columns)
    }

    /// Schema of the item view and add-to-cart tables
    pub fn projected_event() -> Self {
        let columns = crate::records::ProjectedRecord::COLUMNS
            .iter()
            .map(|name| {
                let column_type = if *name == "event_datetime" {
                    ColumnType::Datetime
                } else {
                    ColumnType::String
                };
                ColumnSpec::new(*name, column_type)
            })
            .collect();
        Self { columns }
    }

    /// Schema of the per-user aggregate table
    pub fn aggregate() -> Self {
        Self {
            columns: vec![
                ColumnSpec::new("user_id", ColumnType::String),
                ColumnSpec::new("summed_value", ColumnType::Float),
            ],
        }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Check that a row has exactly this schema's columns, in order, with
    /// values of the matching type
    pub fn validate_row(&self, row: &TableRow) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(SchemaError::row_mismatch(format!(
                "expected {} columns, got {}",
                self.columns.len(),
                row.len()
            )));
        }

        for (column, (name, value)) in self.columns.iter().zip(row.iter()) {
            if column.name != *name {
                return Err(SchemaError::row_mismatch(format!(
                    "expected column '{}', got '{}'",
                    column.name, name
                )));
            }
            if !column.column_type.accepts(value) {
                return Err(SchemaError::row_mismatch(format!(
                    "column '{}' is {} but value is {}",
                    column.name,
                    column.column_type,
                    value.type_name()
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.columns.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl FromStr for TableSchema {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TableSchema {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TableSchema> for String {
    fn from(schema: TableSchema) -> String {
        schema.to_string()
    }
}

/// A single cell of a table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    String(String),
    Float(f64),
}

impl CellValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            CellValue::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::String(_) => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            CellValue::String(_) => "a string",
            CellValue::Float(_) => "a float",
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

/// An ordered row of named cells
///
/// Serializes as a JSON object with keys in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    cells: Vec<(String, CellValue)>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cell
    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.cells.push((column.into(), value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for TableRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aggregate_schema() {
        let schema = TableSchema::parse("user_id:STRING, summed_value:FLOAT").unwrap();
        assert_eq!(schema, TableSchema::aggregate());
        assert_eq!(schema.to_string(), "user_id:STRING, summed_value:FLOAT");
    }

    #[test]
    fn test_parse_projected_event_schema() {
        let spec = "event_datetime:DATETIME, event:STRING, user_id:STRING, client_id:STRING, \
                    page:STRING, page_previous:STRING, item_name:STRING, item_id:STRING, \
                    price:STRING, item_brand:STRING, item_category:STRING, item_category_2:STRING, \
                    item_category_3:STRING, item_category_4:STRING, item_variant:STRING, \
                    item_list_name:STRING, item_list_id:STRING, quantity:STRING";
        let schema = TableSchema::parse(spec).unwrap();
        assert_eq!(schema.len(), 18);
        assert_eq!(schema, TableSchema::projected_event());
    }

    #[test]
    fn test_parse_is_case_insensitive_for_types() {
        let schema = TableSchema::parse("a:string,b:Float").unwrap();
        assert_eq!(schema.columns()[0].column_type, ColumnType::String);
        assert_eq!(schema.columns()[1].column_type, ColumnType::Float);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(TableSchema::parse(""), Err(SchemaError::Empty));
        assert!(matches!(
            TableSchema::parse("user_id"),
            Err(SchemaError::InvalidColumn { .. })
        ));
        assert!(matches!(
            TableSchema::parse("user_id:"),
            Err(SchemaError::InvalidColumn { .. })
        ));
        assert!(matches!(
            TableSchema::parse("value:MONEY"),
            Err(SchemaError::UnknownType { .. })
        ));
        assert_eq!(
            TableSchema::parse("a:STRING, a:FLOAT"),
            Err(SchemaError::DuplicateColumn("a".to_string()))
        );
    }

    #[test]
    fn test_validate_row() {
        let schema = TableSchema::aggregate();

        let row = TableRow::new().with("user_id", "A").with("summed_value", 50.0);
        assert!(schema.validate_row(&row).is_ok());

        let wrong_type = TableRow::new().with("user_id", "A").with("summed_value", "50");
        assert!(schema.validate_row(&wrong_type).is_err());

        let wrong_order = TableRow::new().with("summed_value", 50.0).with("user_id", "A");
        assert!(schema.validate_row(&wrong_order).is_err());

        let too_short = TableRow::new().with("user_id", "A");
        assert!(schema.validate_row(&too_short).is_err());
    }

    #[test]
    fn test_row_serializes_in_column_order() {
        let row = TableRow::new().with("user_id", "A").with("summed_value", 2.5);
        let text = serde_json::to_string(&row).unwrap();
        assert_eq!(text, r#"{"user_id":"A","summed_value":2.5}"#);
        assert_eq!(row.get("summed_value").and_then(CellValue::as_f64), Some(2.5));
    }

    #[test]
    fn test_schema_serde_as_string() {
        let schema = TableSchema::aggregate();
        let text = serde_json::to_string(&schema).unwrap();
        assert_eq!(text, r#""user_id:STRING, summed_value:FLOAT""#);
        let back: TableSchema = serde_json::from_str(&text).unwrap();
        assert_eq!(back, schema);

        let bad: std::result::Result<TableSchema, _> = serde_json::from_str(r#""x:NOPE""#);
        assert!(bad.is_err());
    }
}
