//! Crate-wide error type and result alias.

use std::io;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Unified error type for the store, the schema layer, and the converter.
#[derive(Debug, Error)]
pub enum GraphError {
    /// I/O failure at a file boundary (mapping load, log source/sink).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Malformed input: change events, unified-log lines, mapping fields.
    #[error("parse error: {0}")]
    Parse(String),
    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// An edge endpoint OID that was never registered by a vertex insert.
    #[error("unknown oid {oid} for vertex label {label}")]
    UnknownOid {
        /// Vertex label the endpoint was resolved against.
        label: u32,
        /// Offending original identifier, formatted for display.
        oid: String,
    },
    /// A value exceeded its declared capacity (id fields, table slots).
    #[error("{0} out of range")]
    OutOfRange(&'static str),
    /// Write attempted against a non-updatable column.
    #[error("column {0} is not updatable")]
    NotUpdatable(usize),
    /// No blob schema was recorded for the requested epoch.
    #[error("no blob schema recorded for epoch {0}")]
    VersionNotFound(u64),
    /// Operation the pipeline recognizes but does not implement.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// Invalid argument or configuration.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// A metadata-registry key expected to exist was absent.
    #[error("metadata key not found: {0}")]
    MetaNotFound(String),
}
