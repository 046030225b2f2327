//! Versioned out-edge storage.
//!
//! The analytical engines only need one contract from the adjacency side:
//! append `(src, dst, edge-properties)` at a version, and iterate a source's
//! neighbors pinned at a version. Edges live in per-source segments appended
//! in arrival order; a reader at version `v` observes the prefix of entries
//! with `ver <= v`.

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::error::{GraphError, Result};
use crate::types::{Gid, Version};

#[derive(Clone, Debug)]
struct EdgeEntry {
    dst: Gid,
    ver: Version,
    props: Vec<u8>,
}

/// One neighbor yielded by a cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Neighbor {
    /// Destination vertex, as a global id.
    pub dst: Gid,
    /// Version the edge was appended at.
    pub ver: Version,
    /// Encoded edge property record.
    pub props: Vec<u8>,
}

/// Materialized cursor over a source's neighbors at a pinned version.
pub struct NeighborCursor {
    neighbors: Vec<Neighbor>,
    index: usize,
}

impl NeighborCursor {
    /// Number of neighbors the cursor will yield.
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// True when the cursor yields nothing.
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

impl Iterator for NeighborCursor {
    type Item = Neighbor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.neighbors.len() {
            return None;
        }
        let item = self.neighbors[self.index].clone();
        self.index += 1;
        Some(item)
    }
}

/// Append-only out-edge store for one vertex label.
pub struct AdjacencyStore {
    segments: RwLock<Vec<RwLock<SmallVec<[EdgeEntry; 4]>>>>,
    max_sources: usize,
}

impl AdjacencyStore {
    /// Builds a store addressing source offsets `[0, max_sources)`.
    pub fn new(max_sources: usize) -> Self {
        Self {
            segments: RwLock::new(Vec::new()),
            max_sources,
        }
    }

    /// Appends an out-edge of source offset `src` at `ver`.
    ///
    /// Versions must not regress per source; arrival order within a version
    /// is preserved.
    pub fn append(&self, src: u64, dst: Gid, props: &[u8], ver: Version) -> Result<()> {
        if src as usize >= self.max_sources {
            return Err(GraphError::OutOfRange("adjacency source offset"));
        }
        {
            let segments = self.segments.read();
            if let Some(list) = segments.get(src as usize) {
                return Self::push(list, dst, props, ver);
            }
        }
        let mut segments = self.segments.write();
        while segments.len() <= src as usize {
            segments.push(RwLock::new(SmallVec::new()));
        }
        Self::push(&segments[src as usize], dst, props, ver)
    }

    fn push(
        list: &RwLock<SmallVec<[EdgeEntry; 4]>>,
        dst: Gid,
        props: &[u8],
        ver: Version,
    ) -> Result<()> {
        let mut list = list.write();
        if let Some(last) = list.last() {
            if last.ver > ver {
                return Err(GraphError::Invalid("edge version below segment tail"));
            }
        }
        list.push(EdgeEntry {
            dst,
            ver,
            props: props.to_vec(),
        });
        Ok(())
    }

    /// Cursor over the out-edges of `src` visible at `ver`.
    pub fn neighbors(&self, src: u64, ver: Version) -> NeighborCursor {
        let segments = self.segments.read();
        let neighbors = match segments.get(src as usize) {
            Some(list) => list
                .read()
                .iter()
                .take_while(|e| e.ver <= ver)
                .map(|e| Neighbor {
                    dst: e.dst,
                    ver: e.ver,
                    props: e.props.clone(),
                })
                .collect(),
            None => Vec::new(),
        };
        NeighborCursor {
            neighbors,
            index: 0,
        }
    }

    /// Out-degree of `src` at `ver`.
    pub fn degree(&self, src: u64, ver: Version) -> usize {
        self.neighbors(src, ver).len()
    }

    /// Total edges appended so far, all versions.
    pub fn edge_count(&self) -> usize {
        let segments = self.segments.read();
        segments.iter().map(|list| list.read().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_pin_at_a_version() {
        let adj = AdjacencyStore::new(8);
        adj.append(0, Gid(10), &[], 1).unwrap();
        adj.append(0, Gid(11), &[], 1).unwrap();
        adj.append(0, Gid(12), &[], 3).unwrap();

        assert_eq!(adj.degree(0, 0), 0);
        assert_eq!(adj.degree(0, 1), 2);
        assert_eq!(adj.degree(0, 2), 2);
        let dsts: Vec<Gid> = adj.neighbors(0, 3).map(|n| n.dst).collect();
        assert_eq!(dsts, vec![Gid(10), Gid(11), Gid(12)]);
    }

    #[test]
    fn untouched_sources_have_no_edges() {
        let adj = AdjacencyStore::new(8);
        assert!(adj.neighbors(5, 10).is_empty());
    }

    #[test]
    fn rejects_version_regression_per_source() {
        let adj = AdjacencyStore::new(8);
        adj.append(0, Gid(1), &[], 5).unwrap();
        assert!(adj.append(0, Gid(2), &[], 4).is_err());
        // Other sources are unaffected.
        adj.append(1, Gid(3), &[], 4).unwrap();
    }

    #[test]
    fn rejects_out_of_range_source() {
        let adj = AdjacencyStore::new(2);
        assert!(adj.append(2, Gid(0), &[], 1).is_err());
    }

    #[test]
    fn carries_edge_property_bytes() {
        let adj = AdjacencyStore::new(4);
        adj.append(0, Gid(7), &42u64.to_le_bytes(), 1).unwrap();
        let edge = adj.neighbors(0, 1).next().unwrap();
        assert_eq!(edge.props, 42u64.to_le_bytes().to_vec());
    }
}
