//! Graph schema registry.
//!
//! [`GraphSchema`] is the in-memory description of vertex and edge labels:
//! name/id maps, per-column data types, endpoint labels for edge labels, and
//! the byte geometry of property records. It is built once from an
//! [`RgMapping`] and never evolves after ingest begins.

pub mod rgmapping;

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::json;

use crate::error::{GraphError, Result};
use crate::types::{ELabelId, VLabelId};
use rgmapping::{RgMapping, TypeKind};

/// Stored data type of one property column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PropDataType {
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Fixed-width string cell, zero-padded.
    String,
    /// Days-since-epoch date, stored as i64.
    Date,
}

impl PropDataType {
    /// Maps an RGMapping `data_type` string onto a stored type.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" => Ok(PropDataType::Int),
            "LONG" | "BIGINT" => Ok(PropDataType::Long),
            "FLOAT" => Ok(PropDataType::Float),
            "DOUBLE" => Ok(PropDataType::Double),
            "STRING" | "CHAR" | "VARCHAR" | "TEXT" | "LONGSTRING" => Ok(PropDataType::String),
            "DATE" | "DATETIME" => Ok(PropDataType::Date),
            other => Err(GraphError::Parse(format!("unknown data type {other:?}"))),
        }
    }

    /// Byte width of a cell of this type.
    pub fn vlen(self, string_vlen: usize) -> usize {
        match self {
            PropDataType::Int | PropDataType::Float => 4,
            PropDataType::Long | PropDataType::Double | PropDataType::Date => 8,
            PropDataType::String => string_vlen,
        }
    }
}

/// One column of a property record.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyColumn {
    /// Recognized property name (the source column name).
    pub name: String,
    /// Stored type.
    pub dtype: PropDataType,
    /// Cell width in bytes.
    pub vlen: usize,
    /// Whether the column keeps a version chain.
    pub updatable: bool,
}

/// Immutable schema registry for one graph.
#[derive(Debug, Clone)]
pub struct GraphSchema {
    vertex_label_num: u32,
    elabel_offset: u32,
    property_id_map: FxHashMap<String, usize>,
    label_id_map: FxHashMap<String, u32>,
    label_prop_offset: BTreeMap<u32, usize>,
    dtype_map: FxHashMap<(u32, usize), PropDataType>,
    edge_relation: FxHashMap<u32, (VLabelId, VLabelId)>,
    vertex_columns: Vec<Vec<PropertyColumn>>,
    edge_columns: Vec<Vec<PropertyColumn>>,
    prefix_bytes: FxHashMap<(u32, usize), usize>,
    total_bytes: FxHashMap<u32, usize>,
    edge_prefix_bytes: FxHashMap<(u32, usize), usize>,
    edge_total_bytes: FxHashMap<u32, usize>,
}

impl GraphSchema {
    /// Builds the registry from a validated mapping.
    ///
    /// `string_vlen` fixes the byte width of string cells for every label.
    pub fn from_mapping(mapping: &RgMapping, string_vlen: usize) -> Result<Self> {
        let vertex_label_num = mapping.vertex_label_num;
        let mut schema = GraphSchema {
            vertex_label_num,
            elabel_offset: vertex_label_num,
            property_id_map: FxHashMap::default(),
            label_id_map: FxHashMap::default(),
            label_prop_offset: BTreeMap::new(),
            dtype_map: FxHashMap::default(),
            edge_relation: FxHashMap::default(),
            vertex_columns: vec![Vec::new(); vertex_label_num as usize],
            edge_columns: Vec::new(),
            prefix_bytes: FxHashMap::default(),
            total_bytes: FxHashMap::default(),
            edge_prefix_bytes: FxHashMap::default(),
            edge_total_bytes: FxHashMap::default(),
        };

        // Vertices first so edge endpoint labels resolve regardless of the
        // declaration order in the mapping file.
        let mut prop_offset = 0usize;
        for ty in mapping.types.iter().filter(|t| t.kind == TypeKind::Vertex) {
            schema.label_id_map.insert(ty.label.clone(), ty.id);
            let columns = schema.build_columns(ty.id, &ty.properties, string_vlen)?;
            schema.label_prop_offset.insert(ty.id, prop_offset);
            prop_offset += columns.len();
            schema.vertex_columns[ty.id as usize] = columns;
        }

        let edge_count = mapping
            .types
            .iter()
            .filter(|t| t.kind == TypeKind::Edge)
            .count();
        schema.edge_columns = vec![Vec::new(); edge_count];
        for ty in mapping.types.iter().filter(|t| t.kind == TypeKind::Edge) {
            schema.label_id_map.insert(ty.label.clone(), ty.id);
            let rel = &ty.relationships[0];
            let src = schema.resolve_vertex_label(&rel.src_vertex_label)?;
            let dst = schema.resolve_vertex_label(&rel.dst_vertex_label)?;
            schema.edge_relation.insert(ty.id, (src, dst));
            let columns = schema.build_columns(ty.id, &ty.properties, string_vlen)?;
            schema.label_prop_offset.insert(ty.id, prop_offset);
            prop_offset += columns.len();
            let local = (ty.id - vertex_label_num) as usize;
            if local >= edge_count {
                return Err(GraphError::Parse(format!(
                    "edge label id {} is not dense from vertexLabelNum",
                    ty.id
                )));
            }
            schema.edge_columns[local] = columns;
        }

        schema.compute_byte_geometry();
        Ok(schema)
    }

    fn resolve_vertex_label(&self, name: &str) -> Result<VLabelId> {
        match self.label_id_map.get(name) {
            Some(&id) if id < self.vertex_label_num => Ok(VLabelId(id)),
            _ => Err(GraphError::Parse(format!(
                "edge endpoint references unknown vertex label {name:?}"
            ))),
        }
    }

    fn build_columns(
        &mut self,
        label_id: u32,
        defs: &[rgmapping::PropertyDef],
        string_vlen: usize,
    ) -> Result<Vec<PropertyColumn>> {
        let mut columns = Vec::with_capacity(defs.len());
        for (idx, def) in defs.iter().enumerate() {
            let dtype = match &def.data_type {
                Some(raw) => PropDataType::parse(raw)?,
                None => PropDataType::String,
            };
            let next_id = self.property_id_map.len();
            self.property_id_map
                .entry(def.column_name.clone())
                .or_insert(next_id);
            self.dtype_map.insert((label_id, idx), dtype);
            columns.push(PropertyColumn {
                name: def.column_name.clone(),
                dtype,
                vlen: dtype.vlen(string_vlen),
                updatable: def.updatable,
            });
        }
        Ok(columns)
    }

    fn compute_byte_geometry(&mut self) {
        for (vlabel, columns) in self.vertex_columns.iter().enumerate() {
            let mut prefix = 0usize;
            for (idx, col) in columns.iter().enumerate() {
                self.prefix_bytes.insert((vlabel as u32, idx), prefix);
                prefix += col.vlen;
            }
            self.total_bytes.insert(vlabel as u32, prefix);
        }
        for (elabel, columns) in self.edge_columns.iter().enumerate() {
            let mut prefix = 0usize;
            for (idx, col) in columns.iter().enumerate() {
                self.edge_prefix_bytes.insert((elabel as u32, idx), prefix);
                prefix += col.vlen;
            }
            self.edge_total_bytes.insert(elabel as u32, prefix);
        }
    }

    /// Number of vertex labels.
    pub fn vertex_label_num(&self) -> u32 {
        self.vertex_label_num
    }

    /// Number of edge labels.
    pub fn edge_label_num(&self) -> u32 {
        self.edge_columns.len() as u32
    }

    /// First global label id assigned to edges.
    pub fn elabel_offset(&self) -> u32 {
        self.elabel_offset
    }

    /// Global label id for a label name.
    pub fn label_id(&self, name: &str) -> Option<u32> {
        self.label_id_map.get(name).copied()
    }

    /// Global property index for a recognized property name.
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.property_id_map.get(name).copied()
    }

    /// Base offset of a label's properties in the global property index space.
    pub fn label_prop_offset(&self, label_id: u32) -> Option<usize> {
        self.label_prop_offset.get(&label_id).copied()
    }

    /// Stored type of property `idx` of `label_id`.
    pub fn dtype(&self, label_id: u32, idx: usize) -> Option<PropDataType> {
        self.dtype_map.get(&(label_id, idx)).copied()
    }

    /// Endpoint vertex labels of a global edge label id.
    pub fn edge_relation(&self, edge_label_id: u32) -> Option<(VLabelId, VLabelId)> {
        self.edge_relation.get(&edge_label_id).copied()
    }

    /// Property columns of a vertex label.
    pub fn vertex_columns(&self, vlabel: VLabelId) -> Result<&[PropertyColumn]> {
        self.vertex_columns
            .get(vlabel.index())
            .map(|c| c.as_slice())
            .ok_or(GraphError::OutOfRange("vertex label id"))
    }

    /// Property columns of a local edge label.
    pub fn edge_columns(&self, elabel: ELabelId) -> Result<&[PropertyColumn]> {
        self.edge_columns
            .get(elabel.index())
            .map(|c| c.as_slice())
            .ok_or(GraphError::OutOfRange("edge label id"))
    }

    /// Byte offset of vertex property `idx` within its record.
    pub fn prefix_bytes(&self, vlabel: VLabelId, idx: usize) -> Option<usize> {
        self.prefix_bytes.get(&(vlabel.0, idx)).copied()
    }

    /// Record stride of a vertex label.
    pub fn total_bytes(&self, vlabel: VLabelId) -> Option<usize> {
        self.total_bytes.get(&vlabel.0).copied()
    }

    /// Byte offset of edge property `idx` within its record.
    pub fn edge_prefix_bytes(&self, elabel: ELabelId, idx: usize) -> Option<usize> {
        self.edge_prefix_bytes.get(&(elabel.0, idx)).copied()
    }

    /// Record stride of a local edge label.
    pub fn edge_total_bytes(&self, elabel: ELabelId) -> Option<usize> {
        self.edge_total_bytes.get(&elabel.0).copied()
    }

    /// Publishable JSON description of the schema.
    pub fn to_json(&self, partition: u32) -> serde_json::Value {
        let mut labels: Vec<serde_json::Value> = Vec::new();
        let mut names: Vec<(&String, u32)> =
            self.label_id_map.iter().map(|(n, &id)| (n, id)).collect();
        names.sort_by_key(|(_, id)| *id);
        for (name, id) in names {
            if id < self.elabel_offset {
                labels.push(json!({
                    "name": name,
                    "id": id,
                    "kind": "VERTEX",
                    "prop_offset": self.label_prop_offset.get(&id),
                    "properties": &self.vertex_columns[id as usize],
                }));
            } else {
                let local = (id - self.elabel_offset) as usize;
                let (src, dst) = self.edge_relation[&id];
                labels.push(json!({
                    "name": name,
                    "id": id,
                    "kind": "EDGE",
                    "src_vlabel": src.0,
                    "dst_vlabel": dst.0,
                    "prop_offset": self.label_prop_offset.get(&id),
                    "properties": &self.edge_columns[local],
                }));
            }
        }
        json!({
            "partition": partition,
            "vertex_label_num": self.vertex_label_num,
            "elabel_offset": self.elabel_offset,
            "labels": labels,
        })
    }
}
