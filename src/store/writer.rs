//! Applies unified-log records to one partition's [`GraphStore`].
//!
//! The writer is the single mutator of its partition. Vertices whose global
//! id names this partition become inner vertices with property rows; other
//! vertices become outer mirrors. Edges land in the inner or outer adjacency
//! depending on where their source lives, and remote endpoints register
//! mirrors on demand. Crossing into epoch `E+1` seals epoch `E` through
//! [`GraphStore::update_blob`], which is what makes `E`'s writes visible to
//! readers.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::convert::record::LogRecord;
use crate::error::{GraphError, Result};
use crate::schema::{PropDataType, PropertyColumn};
use crate::store::graph::GraphStore;
use crate::types::{ELabelId, Epoch, Gid, VLabelId};

/// Counters captured by [`GraphWriter`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GraphWriterStats {
    /// Inner vertices applied.
    pub vertices_applied: u64,
    /// Outer mirrors registered.
    pub outer_mirrors: u64,
    /// Edges appended.
    pub edges_applied: u64,
    /// Epochs sealed via `update_blob`.
    pub epochs_sealed: u64,
}

/// Single-threaded record applier for one partition.
pub struct GraphWriter {
    store: Arc<GraphStore>,
    current_epoch: Epoch,
    outer_counts: Vec<u64>,
    outer_lids: Vec<FxHashMap<Gid, u64>>,
    stats: GraphWriterStats,
}

impl GraphWriter {
    /// Builds a writer over `store`, starting at epoch zero.
    pub fn new(store: Arc<GraphStore>) -> Self {
        let labels = store.schema().vertex_label_num() as usize;
        Self {
            store,
            current_epoch: 0,
            outer_counts: vec![0; labels],
            outer_lids: vec![FxHashMap::default(); labels],
            stats: GraphWriterStats::default(),
        }
    }

    /// Current counters.
    pub fn stats(&self) -> GraphWriterStats {
        self.stats
    }

    /// Applies one record. Records must arrive in epoch order.
    pub fn apply(&mut self, record: &LogRecord) -> Result<()> {
        self.advance_to(record.epoch())?;
        match record {
            LogRecord::AddVertex { epoch, gid, props } => self.apply_vertex(*epoch, *gid, props),
            LogRecord::AddEdge {
                epoch,
                elabel,
                src,
                dst,
                props,
            } => self.apply_edge(*epoch, *elabel, *src, *dst, props),
        }
    }

    /// Seals the current epoch. Call once after the stream drains.
    pub fn finish(&mut self) -> Result<()> {
        self.store.update_blob(self.current_epoch)?;
        self.stats.epochs_sealed += 1;
        self.current_epoch += 1;
        Ok(())
    }

    fn advance_to(&mut self, epoch: Epoch) -> Result<()> {
        if epoch < self.current_epoch {
            return Err(GraphError::Invalid("record epoch regressed"));
        }
        while self.current_epoch < epoch {
            self.store.update_blob(self.current_epoch)?;
            self.stats.epochs_sealed += 1;
            self.current_epoch += 1;
        }
        Ok(())
    }

    fn apply_vertex(&mut self, epoch: Epoch, gid: Gid, props: &[String]) -> Result<()> {
        let parser = *self.store.parser();
        let vlabel = parser.label(gid);
        if parser.fid(gid) != u64::from(self.store.partition()) {
            // Remote vertices stay remote until an edge references them;
            // only then does a mirror materialize.
            return Ok(());
        }
        self.store.add_inner(vlabel, gid)?;
        let columns = self.store.schema().vertex_columns(vlabel)?;
        if !columns.is_empty() {
            let record = encode_record(columns, props)?;
            let offset = parser.offset(gid);
            self.store
                .property(vlabel)?
                .insert(offset, gid.0, &record, offset + 1, epoch)?;
        }
        self.stats.vertices_applied += 1;
        Ok(())
    }

    fn apply_edge(
        &mut self,
        epoch: Epoch,
        elabel: ELabelId,
        src: Gid,
        dst: Gid,
        props: &[String],
    ) -> Result<()> {
        let schema = self.store.schema();
        let global = schema.elabel_offset() + elabel.0;
        let (src_label, dst_label) = schema
            .edge_relation(global)
            .ok_or(GraphError::OutOfRange("edge label id"))?;
        let bytes = encode_record(schema.edge_columns(elabel)?, props)?;

        let parser = *self.store.parser();
        let local = u64::from(self.store.partition());
        if parser.fid(src) == local {
            self.store
                .graph(src_label)?
                .append(parser.offset(src), dst, &bytes, epoch)?;
        } else {
            let lid = self.ensure_outer(src_label, src)?;
            self.store
                .ov_graph(src_label)?
                .append(lid, dst, &bytes, epoch)?;
        }
        if parser.fid(dst) != local {
            self.ensure_outer(dst_label, dst)?;
        }
        self.stats.edges_applied += 1;
        Ok(())
    }

    fn ensure_outer(&mut self, vlabel: VLabelId, gid: Gid) -> Result<u64> {
        if let Some(&lid) = self.outer_lids[vlabel.index()].get(&gid) {
            return Ok(lid);
        }
        let lid = self.outer_counts[vlabel.index()];
        self.store.add_outer(vlabel, gid)?;
        self.store.set_ovl2g(vlabel, lid, gid)?;
        self.outer_counts[vlabel.index()] += 1;
        self.outer_lids[vlabel.index()].insert(gid, lid);
        self.stats.outer_mirrors += 1;
        debug!(vlabel = vlabel.0, gid = gid.0, lid, "writer.outer.registered");
        Ok(lid)
    }
}

/// Encodes formatted property values into a fixed-width record.
///
/// Values pair with columns in schema order; a short value list leaves the
/// remaining cells zeroed (the translator skips null properties). Strings
/// longer than their cell truncate to the cell width.
fn encode_record(columns: &[PropertyColumn], props: &[String]) -> Result<Vec<u8>> {
    let total: usize = columns.iter().map(|c| c.vlen).sum();
    let mut record = vec![0u8; total];
    let mut start = 0usize;
    for (idx, col) in columns.iter().enumerate() {
        let cell = &mut record[start..start + col.vlen];
        start += col.vlen;
        let Some(value) = props.get(idx) else { continue };
        match col.dtype {
            PropDataType::Int => {
                let v: i32 = value
                    .parse()
                    .map_err(|_| GraphError::Parse(format!("bad int property {value:?}")))?;
                cell.copy_from_slice(&v.to_le_bytes());
            }
            PropDataType::Long | PropDataType::Date => {
                let v: i64 = value
                    .parse()
                    .map_err(|_| GraphError::Parse(format!("bad long property {value:?}")))?;
                cell.copy_from_slice(&v.to_le_bytes());
            }
            PropDataType::Float => {
                let v: f32 = value
                    .parse()
                    .map_err(|_| GraphError::Parse(format!("bad float property {value:?}")))?;
                cell.copy_from_slice(&v.to_le_bytes());
            }
            PropDataType::Double => {
                let v: f64 = value
                    .parse()
                    .map_err(|_| GraphError::Parse(format!("bad double property {value:?}")))?;
                cell.copy_from_slice(&v.to_le_bytes());
            }
            PropDataType::String => {
                let bytes = value.as_bytes();
                let n = bytes.len().min(col.vlen);
                cell[..n].copy_from_slice(&bytes[..n]);
            }
        }
    }
    Ok(record)
}

/// Decodes a fixed-width string cell back to text, trimming zero padding.
pub fn decode_string_cell(cell: &[u8]) -> String {
    let end = cell.iter().position(|&b| b == 0).unwrap_or(cell.len());
    String::from_utf8_lossy(&cell[..end]).into_owned()
}
