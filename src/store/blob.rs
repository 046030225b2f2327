//! Per-epoch blob schemas: the physical description of each label's columns
//! published to the metadata registry, and the append-only history readers
//! use to open a consistent view at a past epoch.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::types::Epoch;

/// Physical backing of one property column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnBlob {
    /// Flat single-version buffer.
    Fixed {
        /// Cell width in bytes.
        vlen: usize,
        /// Total buffer length in bytes.
        bytes: usize,
    },
    /// Chained multi-version pages.
    Paged {
        /// Cell width in bytes.
        vlen: usize,
        /// Rows per page.
        rows_per_page: usize,
        /// Page-number slots in the column.
        pages: usize,
    },
}

/// Per-label descriptor snapshotted at an epoch boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobSchema {
    /// Vertex label this blob describes.
    pub vlabel: u32,
    /// Slot capacity of the vertex table.
    pub vertex_table_size: usize,
    /// Inner-region bound at snapshot time.
    pub max_inner_location: u64,
    /// Outer-region bound at snapshot time.
    pub min_outer_location: u64,
    /// Property rows visible at this epoch.
    pub visible_rows: u64,
    /// Column backings in schema order.
    pub columns: Vec<ColumnBlob>,
}

/// Append-only `epoch -> (vlabel -> BlobSchema)` history.
#[derive(Default)]
pub struct BlobHistory {
    entries: RwLock<BTreeMap<Epoch, FxHashMap<u32, BlobSchema>>>,
}

impl BlobHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the blob schemas written at `epoch`.
    ///
    /// Epochs are recorded once, in any order; re-recording an epoch is an
    /// error because published snapshots are immutable.
    pub fn insert(&self, epoch: Epoch, schemas: FxHashMap<u32, BlobSchema>) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&epoch) {
            return Err(GraphError::Invalid("blob schema epoch already recorded"));
        }
        entries.insert(epoch, schemas);
        Ok(())
    }

    /// Exact-epoch lookup.
    pub fn fetch(&self, epoch: Epoch) -> Result<FxHashMap<u32, BlobSchema>> {
        self.entries
            .read()
            .get(&epoch)
            .cloned()
            .ok_or(GraphError::VersionNotFound(epoch))
    }

    /// Latest recorded epoch, if any.
    pub fn latest_epoch(&self) -> Option<Epoch> {
        self.entries.read().keys().next_back().copied()
    }

    /// Removes entries strictly older than `min_live_epoch`; returns how
    /// many were dropped.
    pub fn gc(&self, min_live_epoch: Epoch) -> usize {
        let mut entries = self.entries.write();
        let keep = entries.split_off(&min_live_epoch);
        let dropped = entries.len();
        *entries = keep;
        dropped
    }
}
