//! Destination tables and the writers that append to them
//!
//! A [`TableSink`] is the storage seam: it creates a table on first use and
//! appends rows to it. Each [`Destination`] gets its own
//! [`DestinationWriter`], a task that drains an ordered queue of rows and
//! appends them one at a time with retries, a per-call timeout and a halt on
//! schema mismatch. Writers never share ordering with each other.

pub mod memory;
pub mod writer;

pub use memory::InMemoryTableSink;
pub use writer::{DestinationHandle, DestinationWriter, WriterSummary};

use crate::config::{DestinationsConfig, ProcessorConfig};
use crate::error::{Result, SinkResult};
use async_trait::async_trait;
use retail_types::{EventKind, TableRow, TableSchema};
use std::fmt;

/// The three destinations of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Projected `view_item` events
    ItemViews,
    /// Projected `add_to_cart` events
    AddToCarts,
    /// Per-user purchase sums
    Aggregates,
}

impl Destination {
    pub const ALL: [Destination; 3] = [
        Destination::ItemViews,
        Destination::AddToCarts,
        Destination::Aggregates,
    ];

    /// Destination of projected records of the given kind
    pub fn for_kind(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::View => Some(Destination::ItemViews),
            EventKind::CartAdd => Some(Destination::AddToCarts),
            EventKind::Purchase | EventKind::Other => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::ItemViews => "item_views",
            Destination::AddToCarts => "add_to_carts",
            Destination::Aggregates => "aggregates",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table name together with its fixed schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub table: String,
    pub schema: TableSchema,
}

impl TableTarget {
    pub fn new(table: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            table: table.into(),
            schema,
        }
    }

    /// Resolve the table of a destination from configuration
    pub fn from_config(destinations: &DestinationsConfig, destination: Destination) -> Result<Self> {
        let config = match destination {
            Destination::ItemViews => &destinations.item_views,
            Destination::AddToCarts => &destinations.add_to_carts,
            Destination::Aggregates => &destinations.aggregates,
        };
        Ok(Self::new(config.table.clone(), config.table_schema()?))
    }

    /// Resolve every destination
    pub fn all_from_config(config: &ProcessorConfig) -> Result<[(Destination, TableTarget); 3]> {
        Ok([
            (
                Destination::ItemViews,
                Self::from_config(&config.destinations, Destination::ItemViews)?,
            ),
            (
                Destination::AddToCarts,
                Self::from_config(&config.destinations, Destination::AddToCarts)?,
            ),
            (
                Destination::Aggregates,
                Self::from_config(&config.destinations, Destination::Aggregates)?,
            ),
        ])
    }
}

/// Append-only table storage
///
/// Implementations create a table the first time it is used (create if
/// needed) and only ever append to it (write append). A row that does not
/// fit the table schema must be rejected with
/// [`SinkError::SchemaMismatch`](crate::error::SinkError::SchemaMismatch).
#[async_trait]
pub trait TableSink: Send + Sync + fmt::Debug {
    /// Create the table if it does not exist yet
    async fn ensure_table(&self, target: &TableTarget) -> SinkResult<()>;

    /// Append a single row
    async fn append(&self, target: &TableTarget, row: &TableRow) -> SinkResult<()>;

    /// Flush buffered rows
    async fn flush(&self) -> SinkResult<()> {
        Ok(())
    }
}
