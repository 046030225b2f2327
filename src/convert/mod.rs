//! Binlog-to-graph conversion.
//!
//! Turns row-level change events into unified-log records: the typed record
//! format and the stateful translator that allocates global ids.

/// Unified-log record format.
pub mod record;

/// Change-event translator.
pub mod translator;

pub use record::LogRecord;
pub use translator::{BinlogTranslator, TranslatorOptions};
