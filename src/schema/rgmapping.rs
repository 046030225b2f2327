//! Serde model of the RGMapping file that drives the translator.
//!
//! The mapping describes how relational tables project onto graph labels:
//! vertex tables carry an id column, edge tables carry endpoint columns, and
//! both list the property columns replicated into the graph.

use std::path::Path;

use serde::Deserialize;

use crate::error::{GraphError, Result};

/// Top-level RGMapping document.
#[derive(Debug, Clone, Deserialize)]
pub struct RgMapping {
    /// Number of vertex labels; edge label ids are dense from this value.
    #[serde(rename = "vertexLabelNum")]
    pub vertex_label_num: u32,
    /// One entry per mapped table.
    pub types: Vec<TypeMapping>,
}

/// Kind discriminator for a mapped table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TypeKind {
    /// Rows become vertices.
    #[serde(rename = "VERTEX")]
    Vertex,
    /// Rows become edges.
    #[serde(rename = "EDGE")]
    Edge,
}

/// Mapping of a single relational table onto a graph label.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeMapping {
    /// Vertex or edge.
    #[serde(rename = "type")]
    pub kind: TypeKind,
    /// Label id. Vertex ids are dense from 0; edge ids from `vertexLabelNum`.
    pub id: u32,
    /// Source table name as it appears in change events.
    pub table_name: String,
    /// Graph label name.
    pub label: String,
    /// Column holding the original vertex identifier (vertex tables only).
    #[serde(default)]
    pub id_column_name: Option<String>,
    /// Endpoint description (edge tables only; first entry is used).
    #[serde(rename = "rawRelationShips", default)]
    pub relationships: Vec<Relationship>,
    /// Property columns replicated into the graph, in record order.
    #[serde(rename = "propertyDefList", default)]
    pub properties: Vec<PropertyDef>,
}

/// Endpoint columns and labels for an edge table.
#[derive(Debug, Clone, Deserialize)]
pub struct Relationship {
    /// Label name of the source vertex.
    #[serde(rename = "srcVertexLabel")]
    pub src_vertex_label: String,
    /// Label name of the destination vertex.
    #[serde(rename = "dstVertexLabel")]
    pub dst_vertex_label: String,
    /// Column holding the source OID.
    pub src_column_name: String,
    /// Column holding the destination OID.
    pub dst_column_name: String,
}

/// One property column in a mapped table.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDef {
    /// Source column name; also the recognized property name.
    pub column_name: String,
    /// Stored data type; absent means string.
    #[serde(default)]
    pub data_type: Option<String>,
    /// Whether the column accepts versioned updates.
    #[serde(default = "default_updatable")]
    pub updatable: bool,
}

fn default_updatable() -> bool {
    true
}

impl RgMapping {
    /// Parses a mapping from its JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let mapping: RgMapping = serde_json::from_str(text)?;
        mapping.validate()?;
        Ok(mapping)
    }

    /// Reads and parses a mapping file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<()> {
        if self.vertex_label_num == 0 {
            return Err(GraphError::Invalid("mapping declares no vertex labels"));
        }
        let mut seen_vertices = 0u32;
        for ty in &self.types {
            match ty.kind {
                TypeKind::Vertex => {
                    if ty.id >= self.vertex_label_num {
                        return Err(GraphError::Parse(format!(
                            "vertex table {} has id {} outside vertexLabelNum {}",
                            ty.table_name, ty.id, self.vertex_label_num
                        )));
                    }
                    if ty.id_column_name.is_none() {
                        return Err(GraphError::Parse(format!(
                            "vertex table {} is missing id_column_name",
                            ty.table_name
                        )));
                    }
                    seen_vertices += 1;
                }
                TypeKind::Edge => {
                    if ty.id < self.vertex_label_num {
                        return Err(GraphError::Parse(format!(
                            "edge table {} has id {} below vertexLabelNum {}",
                            ty.table_name, ty.id, self.vertex_label_num
                        )));
                    }
                    if ty.relationships.is_empty() {
                        return Err(GraphError::Parse(format!(
                            "edge table {} has no rawRelationShips entry",
                            ty.table_name
                        )));
                    }
                }
            }
        }
        if seen_vertices != self.vertex_label_num {
            return Err(GraphError::Parse(format!(
                "mapping declares {} vertex labels but defines {}",
                self.vertex_label_num, seen_vertices
            )));
        }
        Ok(())
    }
}
