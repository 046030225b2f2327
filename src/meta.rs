//! Metadata-registry boundary.
//!
//! The real deployment keeps schema and blob metadata in an external
//! registry; the store only needs `put`/`get` of string keys, so that is the
//! whole trait. [`MemoryRegistry`] backs tests and single-process runs.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{GraphError, Result};
use crate::types::Epoch;

/// Key/value metadata registry.
pub trait MetaRegistry: Send + Sync {
    /// Stores `value` under `key`, overwriting any previous value.
    fn put(&self, key: &str, value: &str) -> Result<()>;
    /// Fetches the value under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;
}

/// In-memory [`MetaRegistry`].
#[derive(Default)]
pub struct MemoryRegistry {
    entries: RwLock<FxHashMap<String, String>>,
}

impl MemoryRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetaRegistry for MemoryRegistry {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }
}

/// Registry key for a partition's graph schema.
pub fn schema_key(prefix: &str, partition: u32) -> String {
    format!("{prefix}gart_schema_p{partition}")
}

/// Registry key for a partition's latest sealed epoch.
pub fn latest_epoch_key(prefix: &str, partition: u32) -> String {
    format!("{prefix}gart_latest_epoch_p{partition}")
}

/// Registry key for one partition's blob schemas at one epoch.
pub fn blob_key(prefix: &str, machine: u32, partition: u32, epoch: Epoch) -> String {
    format!("{prefix}gart_blob_m{machine}_p{partition}_e{epoch}")
}

/// Startup-time epoch negotiation: the minimum latest epoch across all
/// partitions, which every reader can safely open.
pub fn negotiated_epoch(
    registry: &dyn MetaRegistry,
    prefix: &str,
    partitions: u32,
) -> Result<Epoch> {
    if partitions == 0 {
        return Err(GraphError::Invalid("partition count must be positive"));
    }
    let mut min_epoch = Epoch::MAX;
    for partition in 0..partitions {
        let key = latest_epoch_key(prefix, partition);
        let raw = registry
            .get(&key)?
            .ok_or_else(|| GraphError::MetaNotFound(key.clone()))?;
        let epoch: Epoch = raw
            .parse()
            .map_err(|_| GraphError::Parse(format!("bad epoch value {raw:?} under {key}")))?;
        min_epoch = min_epoch.min(epoch);
    }
    Ok(min_epoch)
}
