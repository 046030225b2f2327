//! Binlog-to-graph translator.
//!
//! Consumes row-level change events (JSON lines) and emits unified-log
//! records. Vertex inserts allocate global ids round-robin across
//! partitions, per label; edge inserts resolve their endpoint OIDs against
//! the side tables those vertex inserts populated. Output order is input
//! order, and the allocation is a pure function of arrival order, so a
//! replay of the same stream yields the same ids.

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::convert::record::LogRecord;
use crate::error::{GraphError, Result};
use crate::ident::IdParser;
use crate::schema::rgmapping::{RgMapping, TypeKind};
use crate::types::{ELabelId, Gid, VLabelId};

/// Translator knobs.
#[derive(Debug, Clone, Copy)]
pub struct TranslatorOptions {
    /// Partition count global ids are spread across.
    pub partitions: u32,
    /// Epoch boundary every N emitted records.
    pub logs_per_epoch: u64,
}

impl TranslatorOptions {
    /// Derives translator options from the process config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            partitions: config.partitions,
            logs_per_epoch: config.logs_per_epoch,
        }
    }
}

/// Stateful change-event translator.
pub struct BinlogTranslator {
    parser: IdParser,
    partitions: u64,
    logs_per_epoch: u64,
    vertex_tables: FxHashMap<String, VLabelId>,
    edge_tables: FxHashMap<String, ELabelId>,
    vertex_key_columns: FxHashMap<String, String>,
    edge_endpoint_columns: FxHashMap<String, (String, String)>,
    edge_endpoints: Vec<(VLabelId, VLabelId)>,
    required_properties: FxHashMap<String, Vec<String>>,
    string_oid_maps: Vec<FxHashMap<String, Gid>>,
    int_oid_maps: Vec<FxHashMap<i64, Gid>>,
    vertex_nums: Vec<u64>,
    vertex_nums_per_fragment: Vec<Vec<u64>>,
    log_count: u64,
}

impl BinlogTranslator {
    /// Builds a translator for one mapping.
    pub fn new(mapping: &RgMapping, opts: TranslatorOptions) -> Result<Self> {
        if opts.partitions == 0 {
            return Err(GraphError::Invalid("partition count must be positive"));
        }
        if opts.logs_per_epoch == 0 {
            return Err(GraphError::Invalid("logs_per_epoch must be positive"));
        }
        let vlabels = mapping.vertex_label_num as usize;
        let parser = IdParser::new(u64::from(opts.partitions), vlabels as u64)?;

        let mut vertex_tables = FxHashMap::default();
        let mut edge_tables = FxHashMap::default();
        let mut vertex_key_columns = FxHashMap::default();
        let mut edge_endpoint_columns = FxHashMap::default();
        let mut required_properties = FxHashMap::default();
        let mut label_ids: FxHashMap<&str, VLabelId> = FxHashMap::default();

        for ty in mapping.types.iter().filter(|t| t.kind == TypeKind::Vertex) {
            vertex_tables.insert(ty.table_name.clone(), VLabelId(ty.id));
            label_ids.insert(ty.label.as_str(), VLabelId(ty.id));
            let key_col = ty
                .id_column_name
                .clone()
                .ok_or(GraphError::Invalid("vertex table without id column"))?;
            vertex_key_columns.insert(ty.table_name.clone(), key_col);
        }

        let edge_count = mapping
            .types
            .iter()
            .filter(|t| t.kind == TypeKind::Edge)
            .count();
        let mut edge_endpoints = vec![(VLabelId(0), VLabelId(0)); edge_count];
        for ty in mapping.types.iter().filter(|t| t.kind == TypeKind::Edge) {
            let local = ELabelId(ty.id - mapping.vertex_label_num);
            if local.index() >= edge_count {
                return Err(GraphError::Parse(format!(
                    "edge label id {} is not dense from vertexLabelNum",
                    ty.id
                )));
            }
            edge_tables.insert(ty.table_name.clone(), local);
            let rel = &ty.relationships[0];
            let src = *label_ids.get(rel.src_vertex_label.as_str()).ok_or_else(|| {
                GraphError::Parse(format!(
                    "edge table {} references unknown label {:?}",
                    ty.table_name, rel.src_vertex_label
                ))
            })?;
            let dst = *label_ids.get(rel.dst_vertex_label.as_str()).ok_or_else(|| {
                GraphError::Parse(format!(
                    "edge table {} references unknown label {:?}",
                    ty.table_name, rel.dst_vertex_label
                ))
            })?;
            edge_endpoints[local.index()] = (src, dst);
            edge_endpoint_columns.insert(
                ty.table_name.clone(),
                (rel.src_column_name.clone(), rel.dst_column_name.clone()),
            );
        }

        for ty in &mapping.types {
            required_properties.insert(
                ty.table_name.clone(),
                ty.properties.iter().map(|p| p.column_name.clone()).collect(),
            );
        }

        Ok(Self {
            parser,
            partitions: u64::from(opts.partitions),
            logs_per_epoch: opts.logs_per_epoch,
            vertex_tables,
            edge_tables,
            vertex_key_columns,
            edge_endpoint_columns,
            edge_endpoints,
            required_properties,
            string_oid_maps: vec![FxHashMap::default(); vlabels],
            int_oid_maps: vec![FxHashMap::default(); vlabels],
            vertex_nums: vec![0; vlabels],
            vertex_nums_per_fragment: vec![vec![0; opts.partitions as usize]; vlabels],
            log_count: 0,
        })
    }

    /// Records emitted so far; also the epoch clock numerator.
    pub fn emitted(&self) -> u64 {
        self.log_count
    }

    /// Shared id codec.
    pub fn parser(&self) -> &IdParser {
        &self.parser
    }

    /// Translates one change-event line.
    ///
    /// `Ok(None)` is a deliberate drop: empty lines, unknown event types,
    /// unmapped tables. Deletes and updates are rejected with
    /// [`GraphError::Unsupported`] so missing coverage stays visible.
    pub fn translate(&mut self, line: &str) -> Result<Option<LogRecord>> {
        if line.trim().is_empty() {
            return Ok(None);
        }
        let event: Value = serde_json::from_str(line)?;
        let kind = event
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphError::Parse("change event missing type".into()))?;
        match kind {
            "insert" => self.translate_insert(&event),
            "delete" => Err(GraphError::Unsupported("delete of vertices or edges")),
            "update" => Err(GraphError::Unsupported("update of vertices or edges")),
            other => {
                debug!(kind = other, "translator.drop.unknown_type");
                Ok(None)
            }
        }
    }

    fn translate_insert(&mut self, event: &Value) -> Result<Option<LogRecord>> {
        let table = event
            .get("table")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphError::Parse("change event missing table".into()))?;
        let data = event
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| GraphError::Parse("change event missing data object".into()))?;

        if let Some(vlabel) = self.vertex_tables.get(table).copied() {
            let record = self.translate_vertex(table, vlabel, data)?;
            return Ok(Some(record));
        }
        if let Some(elabel) = self.edge_tables.get(table).copied() {
            let record = self.translate_edge(table, elabel, data)?;
            return Ok(Some(record));
        }
        debug!(table, "translator.drop.unknown_table");
        Ok(None)
    }

    fn translate_vertex(
        &mut self,
        table: &str,
        vlabel: VLabelId,
        data: &serde_json::Map<String, Value>,
    ) -> Result<LogRecord> {
        // Serialize properties before touching any counter so a rejected
        // message burns no offsets and replays stay deterministic.
        let props = self.serialize_props(table, data)?;

        let l = vlabel.index();
        let fid = self.vertex_nums[l] % self.partitions;
        let offset = self.vertex_nums_per_fragment[l][fid as usize];
        let gid = self.parser.generate(fid, vlabel, offset)?;
        self.vertex_nums[l] += 1;
        self.vertex_nums_per_fragment[l][fid as usize] += 1;

        let key_col = &self.vertex_key_columns[table];
        match data.get(key_col) {
            Some(Value::Number(n)) if n.is_i64() => {
                self.int_oid_maps[l].insert(n.as_i64().expect("checked i64"), gid);
            }
            Some(Value::String(s)) => {
                self.string_oid_maps[l].insert(s.clone(), gid);
            }
            other => {
                debug!(table, column = key_col.as_str(), value = ?other, "translator.oid.unmappable");
            }
        }

        let epoch = self.log_count / self.logs_per_epoch;
        self.log_count += 1;
        Ok(LogRecord::AddVertex { epoch, gid, props })
    }

    fn translate_edge(
        &mut self,
        table: &str,
        elabel: ELabelId,
        data: &serde_json::Map<String, Value>,
    ) -> Result<LogRecord> {
        let (src_label, dst_label) = self.edge_endpoints[elabel.index()];
        let (src_col, dst_col) = self.edge_endpoint_columns[table].clone();
        let src = self.resolve_endpoint(src_label, data.get(&src_col), &src_col)?;
        let dst = self.resolve_endpoint(dst_label, data.get(&dst_col), &dst_col)?;
        let props = self.serialize_props(table, data)?;

        let epoch = self.log_count / self.logs_per_epoch;
        self.log_count += 1;
        Ok(LogRecord::AddEdge {
            epoch,
            elabel,
            src,
            dst,
            props,
        })
    }

    fn resolve_endpoint(
        &self,
        vlabel: VLabelId,
        value: Option<&Value>,
        column: &str,
    ) -> Result<Gid> {
        match value {
            Some(Value::Number(n)) if n.is_i64() => {
                let oid = n.as_i64().expect("checked i64");
                self.int_oid_maps[vlabel.index()]
                    .get(&oid)
                    .copied()
                    .ok_or_else(|| GraphError::UnknownOid {
                        label: vlabel.0,
                        oid: oid.to_string(),
                    })
            }
            Some(Value::String(s)) => self.string_oid_maps[vlabel.index()]
                .get(s)
                .copied()
                .ok_or_else(|| GraphError::UnknownOid {
                    label: vlabel.0,
                    oid: s.clone(),
                }),
            _ => Err(GraphError::Parse(format!(
                "edge endpoint column {column:?} must be an integer or string"
            ))),
        }
    }

    fn serialize_props(
        &self,
        table: &str,
        data: &serde_json::Map<String, Value>,
    ) -> Result<Vec<String>> {
        let names = &self.required_properties[table];
        let mut props = Vec::with_capacity(names.len());
        for name in names {
            match data.get(name) {
                Some(Value::String(s)) => {
                    if s.contains('|') {
                        return Err(GraphError::Parse(format!(
                            "string property {name:?} contains the reserved delimiter '|'"
                        )));
                    }
                    props.push(s.clone());
                }
                Some(Value::Number(n)) => {
                    if let Some(i) = n.as_i64() {
                        props.push(i.to_string());
                    } else if let Some(f) = n.as_f64() {
                        props.push(f.to_string());
                    }
                }
                // Null, boolean, and nested values skip the property.
                _ => continue,
            }
        }
        Ok(props)
    }
}
