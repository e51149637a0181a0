//! Core types and data models for the retail clickstream pipeline
//!
//! This crate provides the data structures shared by the stream processor:
//! raw decoded events and their classification, the flat records written to
//! the warehouse destinations, and the table schemas those destinations use.

pub mod errors;
pub mod events;
pub mod records;
pub mod schema;

pub use errors::{Result, SchemaError};
pub use events::{EventKind, RawEvent};
pub use records::{AggregateRecord, ProjectedRecord, PurchaseValue};
pub use schema::{CellValue, ColumnSpec, ColumnType, TableRow, TableSchema};
