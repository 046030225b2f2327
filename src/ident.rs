//! Bit-packed codec between (fragment, label, offset) triples and [`Gid`]s.
//!
//! Field widths are fixed at initialization from the declared partition and
//! vertex-label counts. The encoding uses the low 63 bits only; bit 63 stays
//! clear so the vertex table can reuse it as a tombstone marker.

use crate::error::{GraphError, Result};
use crate::types::{Gid, VLabelId};

/// Encoder/decoder for global graph identifiers.
///
/// Layout, high to low: `[1 reserved][fid][label][offset]`.
#[derive(Clone, Copy, Debug)]
pub struct IdParser {
    fid_bits: u32,
    label_bits: u32,
    offset_bits: u32,
}

/// Number of bits available to the three packed fields.
const USABLE_BITS: u32 = 63;

fn bits_to_index(n: u64) -> u32 {
    // Indexing n values needs ceil(log2(n)) bits, at least one.
    (64 - (n - 1).leading_zeros()).max(1)
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

impl IdParser {
    /// Derives field widths for the declared capacities.
    pub fn new(partitions: u64, vertex_labels: u64) -> Result<Self> {
        if partitions == 0 || vertex_labels == 0 {
            return Err(GraphError::Invalid(
                "id parser needs at least one partition and one vertex label",
            ));
        }
        let fid_bits = bits_to_index(partitions);
        let label_bits = bits_to_index(vertex_labels);
        if fid_bits + label_bits >= USABLE_BITS {
            return Err(GraphError::OutOfRange("id field widths"));
        }
        Ok(Self {
            fid_bits,
            label_bits,
            offset_bits: USABLE_BITS - fid_bits - label_bits,
        })
    }

    /// Packs a (fragment, label, offset) triple into a [`Gid`].
    pub fn generate(&self, fid: u64, label: VLabelId, offset: u64) -> Result<Gid> {
        if fid > mask(self.fid_bits) {
            return Err(GraphError::OutOfRange("fragment id"));
        }
        if u64::from(label.0) > mask(self.label_bits) {
            return Err(GraphError::OutOfRange("vertex label id"));
        }
        if offset > mask(self.offset_bits) {
            return Err(GraphError::OutOfRange("vertex offset"));
        }
        let packed = (fid << (self.label_bits + self.offset_bits))
            | (u64::from(label.0) << self.offset_bits)
            | offset;
        Ok(Gid(packed))
    }

    /// Fragment id embedded in `gid`.
    pub fn fid(&self, gid: Gid) -> u64 {
        (gid.0 >> (self.label_bits + self.offset_bits)) & mask(self.fid_bits)
    }

    /// Vertex label embedded in `gid`.
    pub fn label(&self, gid: Gid) -> VLabelId {
        VLabelId(((gid.0 >> self.offset_bits) & mask(self.label_bits)) as u32)
    }

    /// Per-partition-per-label offset embedded in `gid`.
    pub fn offset(&self, gid: Gid) -> u64 {
        gid.0 & mask(self.offset_bits)
    }

    /// Width of the offset field, in bits.
    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }
}
