//! Partitioned, versioned graph storage.
//!
//! Holds the per-label building blocks (vertex tables, paged property
//! columns, adjacency segments), the store binding them per partition, and
//! the writer that feeds it from the unified log.

/// Versioned out-edge segments.
pub mod adjacency;

/// Per-epoch blob schemas and their append-only history.
pub mod blob;

/// Per-partition store binding tables, properties, and adjacency.
pub mod graph;

/// Versioned paged columnar property storage.
pub mod paged;

/// Two-ended vertex slot tables with tombstoning.
pub mod vtable;

/// Unified-log record applier.
pub mod writer;

pub use adjacency::{AdjacencyStore, Neighbor, NeighborCursor};
pub use blob::{BlobHistory, BlobSchema, ColumnBlob};
pub use graph::{GraphStore, GraphStoreOptions, PropertySnapshot};
pub use paged::{
    ColumnCursor, ColumnPages, Page, PagedPropertyStore, PagedStoreOptions, StoreMetricsSnapshot,
};
pub use vtable::{VertexCursor, VertexTable, TOMBSTONE_BIT};
pub use writer::{decode_string_cell, GraphWriter, GraphWriterStats};
