//! # Tessera - Versioned Property-Graph Store over a Change Stream
//!
//! Tessera ingests row-level change events from a relational source and
//! maintains a partitioned, labeled, versioned property graph that
//! analytical workers query at a consistent past epoch.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera::convert::{BinlogTranslator, TranslatorOptions};
//! use tessera::meta::MemoryRegistry;
//! use tessera::schema::{rgmapping::RgMapping, GraphSchema};
//! use tessera::store::{GraphStore, GraphStoreOptions, GraphWriter};
//!
//! let mapping = RgMapping::from_json(r#"{
//!     "vertexLabelNum": 1,
//!     "types": [{
//!         "type": "VERTEX", "id": 0,
//!         "table_name": "person", "label": "person",
//!         "id_column_name": "id",
//!         "propertyDefList": [{"column_name": "name"}]
//!     }]
//! }"#)?;
//!
//! // Translate a change event into a unified-log record...
//! let mut translator = BinlogTranslator::new(
//!     &mapping,
//!     TranslatorOptions { partitions: 1, logs_per_epoch: 2 },
//! )?;
//! let record = translator
//!     .translate(r#"{"type":"insert","table":"person","data":{"id":1,"name":"A"}}"#)?
//!     .expect("mapped table");
//!
//! // ...and apply it to a partition's store.
//! let schema = GraphSchema::from_mapping(&mapping, 64)?;
//! let store = Arc::new(GraphStore::new(
//!     schema,
//!     GraphStoreOptions {
//!         partition: 0,
//!         machine: 0,
//!         total_partitions: 1,
//!         vertex_capacity: 1024,
//!         rows_per_page: 64,
//!         meta_prefix: String::new(),
//!     },
//!     Arc::new(MemoryRegistry::new()),
//! )?);
//! let mut writer = GraphWriter::new(store.clone());
//! writer.apply(&record)?;
//! writer.finish()?;
//! # Ok::<(), tessera::GraphError>(())
//! ```
//!
//! ## Architecture
//!
//! - **Converter**: change events in, unified-log records out; owns the
//!   OID-to-GID maps and the round-robin partition assignment.
//! - **Store**: per-label vertex tables, paged multi-version property
//!   columns, versioned adjacency; epochs seal by snapshotting blob schemas
//!   into an append-only history.
//! - **Metadata boundary**: schema and blob JSON published through the
//!   [`meta::MetaRegistry`] trait; transports stay outside the crate.

/// Process and store configuration.
pub mod config;

/// Binlog-to-graph conversion.
pub mod convert;

/// Error type and result alias.
pub mod error;

/// Global-id bit packing.
pub mod ident;

/// Tracing bootstrap.
pub mod logging;

/// Metadata-registry boundary.
pub mod meta;

/// Schema registry and RGMapping model.
pub mod schema;

/// Partitioned, versioned graph storage.
pub mod store;

/// Identifier newtypes.
pub mod types;

// Re-export the main public API.
pub use crate::config::Config;
pub use crate::convert::{BinlogTranslator, LogRecord, TranslatorOptions};
pub use crate::error::{GraphError, Result};
pub use crate::ident::IdParser;
pub use crate::schema::GraphSchema;
pub use crate::store::{GraphStore, GraphStoreOptions, GraphWriter, PagedPropertyStore};
pub use crate::types::{ELabelId, Epoch, Gid, SeqNum, VLabelId, Version};
