//! Two-ended vertex slot table with append-only tombstones.
//!
//! Inner vertices (owned by this partition) grow from the front; outer
//! mirrors grow from the back. A deletion never rewrites an occupied slot:
//! it appends a marker whose payload is the index of the removed entry with
//! the high bit set, so readers holding old indices stay valid.
#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashSet;
use tracing::warn;

use crate::error::{GraphError, Result};
use crate::ident::IdParser;
use crate::types::Gid;

/// High bit marking a slot as a tombstone; its low bits hold the index of
/// the entry being logically removed. [`IdParser`] never sets this bit.
pub const TOMBSTONE_BIT: u64 = 1 << 63;

/// Fixed-size table of GID slots for one vertex label.
pub struct VertexTable {
    slots: Vec<AtomicU64>,
    size: usize,
    max_inner: AtomicU64,
    min_outer: AtomicU64,
    max_inner_location: AtomicU64,
    min_outer_location: AtomicU64,
}

impl VertexTable {
    /// Builds an empty table with `size` slots.
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| AtomicU64::new(0)).collect(),
            size,
            max_inner: AtomicU64::new(0),
            min_outer: AtomicU64::new(size as u64),
            max_inner_location: AtomicU64::new(0),
            min_outer_location: AtomicU64::new(size as u64),
        }
    }

    /// Slot capacity.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Exclusive upper bound of the inner region.
    pub fn max_inner_location(&self) -> u64 {
        self.max_inner_location.load(Ordering::Acquire)
    }

    /// Inclusive lower bound of the outer region.
    pub fn min_outer_location(&self) -> u64 {
        self.min_outer_location.load(Ordering::Acquire)
    }

    /// High-water mark of inner inserts.
    ///
    /// Deletions do not decrement this counter; it counts insertions, not
    /// live vertices. Count live vertices by iterating.
    pub fn max_inner(&self) -> u64 {
        self.max_inner.load(Ordering::Acquire)
    }

    /// Low-water mark of outer inserts, as a slot position.
    pub fn min_outer(&self) -> u64 {
        self.min_outer.load(Ordering::Acquire)
    }

    /// Appends an inner vertex at the front growth point.
    pub fn add_inner(&self, gid: Gid) -> Result<()> {
        let loc = self.max_inner_location.load(Ordering::Acquire);
        if loc >= self.min_outer_location.load(Ordering::Acquire) {
            return Err(GraphError::OutOfRange("vertex table inner region"));
        }
        self.slots[loc as usize].store(gid.0, Ordering::Relaxed);
        // The location bump publishes the slot to readers.
        self.max_inner_location.store(loc + 1, Ordering::Release);
        self.max_inner.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Tombstones the inner entry whose embedded offset matches `offset`.
    ///
    /// A missing entry is a no-op; the deletion of an already-deleted vertex
    /// arrives in replays and is harmless.
    pub fn delete_inner(&self, parser: &IdParser, offset: u64) -> Result<()> {
        let end = self.max_inner_location.load(Ordering::Acquire);
        for i in 0..end {
            let value = self.slots[i as usize].load(Ordering::Relaxed);
            if value & TOMBSTONE_BIT != 0 {
                continue;
            }
            if parser.offset(Gid(value)) == offset {
                let loc = self.max_inner_location.load(Ordering::Acquire);
                if loc >= self.min_outer_location.load(Ordering::Acquire) {
                    return Err(GraphError::OutOfRange("vertex table inner region"));
                }
                self.slots[loc as usize].store(i | TOMBSTONE_BIT, Ordering::Relaxed);
                self.max_inner_location.store(loc + 1, Ordering::Release);
                return Ok(());
            }
        }
        Ok(())
    }

    /// Appends an outer mirror at the back growth point.
    pub fn add_outer(&self, gid: Gid) -> Result<()> {
        let loc = self.min_outer_location.load(Ordering::Acquire);
        if loc <= self.max_inner_location.load(Ordering::Acquire) {
            return Err(GraphError::OutOfRange("vertex table outer region"));
        }
        self.slots[loc as usize - 1].store(gid.0, Ordering::Relaxed);
        self.min_outer_location.store(loc - 1, Ordering::Release);
        self.min_outer.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    /// Tombstones the outer entry holding exactly `gid`.
    ///
    /// A miss is logged and ignored.
    pub fn delete_outer(&self, gid: Gid) -> Result<()> {
        let begin = self.min_outer_location.load(Ordering::Acquire);
        for i in (begin..self.size as u64).rev() {
            let value = self.slots[i as usize].load(Ordering::Relaxed);
            if value & TOMBSTONE_BIT != 0 {
                continue;
            }
            if value == gid.0 {
                let loc = self.min_outer_location.load(Ordering::Acquire);
                if loc <= self.max_inner_location.load(Ordering::Acquire) {
                    return Err(GraphError::OutOfRange("vertex table outer region"));
                }
                self.slots[loc as usize - 1].store(i | TOMBSTONE_BIT, Ordering::Relaxed);
                self.min_outer_location.store(loc - 1, Ordering::Release);
                return Ok(());
            }
        }
        warn!(gid = gid.0, "vtable.delete_outer.miss");
        Ok(())
    }

    /// Raw slot value, tombstone bit included.
    pub fn slot(&self, index: u64) -> Option<u64> {
        self.slots
            .get(index as usize)
            .map(|s| s.load(Ordering::Relaxed))
    }

    /// Cursor over live inner vertices, in insertion order.
    pub fn inner_vertices(&self) -> VertexCursor {
        let end = self.max_inner_location.load(Ordering::Acquire);
        self.collect_region((0..end).collect())
    }

    /// Cursor over live outer mirrors, newest first.
    pub fn outer_vertices(&self) -> VertexCursor {
        let begin = self.min_outer_location.load(Ordering::Acquire);
        self.collect_region((begin..self.size as u64).collect())
    }

    /// Cursor over every live vertex: inner region then outer region.
    pub fn all_vertices(&self) -> VertexCursor {
        let end = self.max_inner_location.load(Ordering::Acquire);
        let begin = self.min_outer_location.load(Ordering::Acquire);
        let indices: Vec<u64> = (0..end).chain(begin..self.size as u64).collect();
        self.collect_region(indices)
    }

    fn collect_region(&self, indices: Vec<u64>) -> VertexCursor {
        let mut deleted: FxHashSet<u64> = FxHashSet::default();
        for &i in &indices {
            let value = self.slots[i as usize].load(Ordering::Relaxed);
            if value & TOMBSTONE_BIT != 0 {
                deleted.insert(value & !TOMBSTONE_BIT);
            }
        }
        let gids = indices
            .into_iter()
            .filter_map(|i| {
                let value = self.slots[i as usize].load(Ordering::Relaxed);
                if value & TOMBSTONE_BIT != 0 || deleted.contains(&i) {
                    None
                } else {
                    Some(Gid(value))
                }
            })
            .collect();
        VertexCursor { gids, index: 0 }
    }
}

/// Materialized cursor over table entries.
pub struct VertexCursor {
    gids: Vec<Gid>,
    index: usize,
}

impl VertexCursor {
    /// Number of vertices the cursor will yield.
    pub fn len(&self) -> usize {
        self.gids.len()
    }

    /// True when the cursor yields nothing.
    pub fn is_empty(&self) -> bool {
        self.gids.is_empty()
    }
}

impl Iterator for VertexCursor {
    type Item = Gid;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.gids.len() {
            return None;
        }
        let gid = self.gids[self.index];
        self.index += 1;
        Some(gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VLabelId;

    fn parser() -> IdParser {
        IdParser::new(2, 2).unwrap()
    }

    #[test]
    fn inner_growth_preserves_insertion_order() {
        let parser = parser();
        let table = VertexTable::new(16);
        let gids: Vec<Gid> = (0..3)
            .map(|off| parser.generate(0, VLabelId(0), off).unwrap())
            .collect();
        for &gid in &gids {
            table.add_inner(gid).unwrap();
        }
        assert_eq!(table.max_inner_location(), 3);
        assert_eq!(table.max_inner(), 3);
        let seen: Vec<Gid> = table.inner_vertices().collect();
        assert_eq!(seen, gids);
    }

    #[test]
    fn tombstone_skips_deleted_inner_vertex() {
        let parser = parser();
        let table = VertexTable::new(16);
        let a = parser.generate(0, VLabelId(0), 0).unwrap();
        let b = parser.generate(0, VLabelId(0), 1).unwrap();
        table.add_inner(a).unwrap();
        table.add_inner(b).unwrap();
        let before = table.max_inner_location();
        table.delete_inner(&parser, parser.offset(a)).unwrap();

        assert_eq!(
            table.max_inner_location(),
            before + 1,
            "insert then delete grows the region by two in total"
        );
        let seen: Vec<Gid> = table.inner_vertices().collect();
        assert_eq!(seen, vec![b]);
        // The tombstone payload points at the original entry.
        assert_eq!(table.slot(2).unwrap(), TOMBSTONE_BIT);
        // The original slot is untouched for readers holding its index.
        assert_eq!(table.slot(0).unwrap(), a.0);
    }

    #[test]
    fn delete_inner_is_noop_for_unknown_offset() {
        let parser = parser();
        let table = VertexTable::new(8);
        table
            .add_inner(parser.generate(0, VLabelId(0), 0).unwrap())
            .unwrap();
        table.delete_inner(&parser, 99).unwrap();
        assert_eq!(table.max_inner_location(), 1);
    }

    #[test]
    fn outer_region_grows_downward() {
        let parser = parser();
        let table = VertexTable::new(8);
        let x = parser.generate(1, VLabelId(0), 0).unwrap();
        let y = parser.generate(1, VLabelId(0), 1).unwrap();
        table.add_outer(x).unwrap();
        table.add_outer(y).unwrap();
        assert_eq!(table.min_outer_location(), 6);
        assert_eq!(table.slot(7).unwrap(), x.0);
        assert_eq!(table.slot(6).unwrap(), y.0);
        let seen: Vec<Gid> = table.outer_vertices().collect();
        assert_eq!(seen, vec![y, x]);
    }

    #[test]
    fn delete_outer_tombstones_matching_mirror() {
        let parser = parser();
        let table = VertexTable::new(8);
        let x = parser.generate(1, VLabelId(0), 0).unwrap();
        let y = parser.generate(1, VLabelId(0), 1).unwrap();
        table.add_outer(x).unwrap();
        table.add_outer(y).unwrap();
        table.delete_outer(x).unwrap();
        let seen: Vec<Gid> = table.outer_vertices().collect();
        assert_eq!(seen, vec![y]);
        // Miss is ignored.
        table
            .delete_outer(parser.generate(1, VLabelId(0), 9).unwrap())
            .unwrap();
    }

    #[test]
    fn regions_never_cross() {
        let parser = parser();
        let table = VertexTable::new(2);
        table
            .add_inner(parser.generate(0, VLabelId(0), 0).unwrap())
            .unwrap();
        table
            .add_outer(parser.generate(1, VLabelId(0), 0).unwrap())
            .unwrap();
        assert!(matches!(
            table.add_inner(parser.generate(0, VLabelId(0), 1).unwrap()),
            Err(GraphError::OutOfRange(_))
        ));
        assert!(matches!(
            table.add_outer(parser.generate(1, VLabelId(0), 1).unwrap()),
            Err(GraphError::OutOfRange(_))
        ));
    }

    #[test]
    fn all_vertices_covers_both_regions() {
        let parser = parser();
        let table = VertexTable::new(8);
        let inner = parser.generate(0, VLabelId(0), 0).unwrap();
        let outer = parser.generate(1, VLabelId(0), 0).unwrap();
        table.add_inner(inner).unwrap();
        table.add_outer(outer).unwrap();
        let seen: Vec<Gid> = table.all_vertices().collect();
        assert_eq!(seen, vec![inner, outer]);
    }
}
