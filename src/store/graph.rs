//! Per-partition graph store.
//!
//! Binds the vertex tables, property stores, and adjacency of every vertex
//! label; owns the blob-schema history and the OID placement side-tables;
//! publishes schema and per-epoch blob metadata to the registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::ident::IdParser;
use crate::meta::{self, MetaRegistry};
use crate::schema::GraphSchema;
use crate::store::adjacency::AdjacencyStore;
use crate::store::blob::{BlobHistory, BlobSchema, ColumnBlob};
use crate::store::paged::{ColumnCursor, PagedPropertyStore, PagedStoreOptions};
use crate::store::vtable::VertexTable;
use crate::types::{Epoch, Gid, VLabelId, Version};

const EPOCH_UNSET: u64 = u64::MAX;

/// Identity and sizing of one partition's store.
#[derive(Debug, Clone)]
pub struct GraphStoreOptions {
    /// Partition owned by this store.
    pub partition: u32,
    /// Machine id used in blob registry keys.
    pub machine: u32,
    /// Total partitions in the deployment.
    pub total_partitions: u32,
    /// Slot capacity of each per-label vertex table.
    pub vertex_capacity: usize,
    /// Rows per page in updatable property columns.
    pub rows_per_page: usize,
    /// Namespace prefix for registry keys.
    pub meta_prefix: String,
}

impl GraphStoreOptions {
    /// Derives store options from the process config.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            partition: config.partition,
            machine: config.machine,
            total_partitions: config.partitions,
            vertex_capacity: config.vertex_capacity,
            rows_per_page: config.rows_per_page,
            meta_prefix: config.meta_prefix.clone(),
        }
    }
}

/// Read-only property handle pinned at one version.
pub struct PropertySnapshot {
    store: Arc<PagedPropertyStore>,
    version: Version,
}

impl PropertySnapshot {
    /// The pinned version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Point read at the pinned version.
    pub fn get(&self, offset: u64, cid: usize) -> Result<Vec<u8>> {
        self.store.get(offset, cid, self.version)
    }

    /// Column cursor at the pinned version.
    pub fn cursor(&self, cid: usize) -> Result<ColumnCursor<'_>> {
        self.store.cursor(cid, self.version)
    }

    /// Rows visible at the last sealed header.
    pub fn visible_rows(&self) -> u64 {
        self.store.visible_rows()
    }
}

/// One partition's graph state.
pub struct GraphStore {
    opts: GraphStoreOptions,
    parser: IdParser,
    schema: GraphSchema,
    vertex_tables: Vec<VertexTable>,
    property_stores: Vec<Option<Arc<PagedPropertyStore>>>,
    graphs: Vec<AdjacencyStore>,
    ov_graphs: Vec<AdjacencyStore>,
    ovl2g: Vec<RwLock<FxHashMap<u64, Gid>>>,
    key_pid: Vec<RwLock<FxHashMap<u64, u32>>>,
    key_off: Vec<RwLock<FxHashMap<u64, u64>>>,
    pid_off: Vec<RwLock<FxHashMap<u32, u64>>>,
    key_lid: Vec<RwLock<FxHashMap<u64, u64>>>,
    history: BlobHistory,
    registry: Arc<dyn MetaRegistry>,
    latest_sealed: AtomicU64,
}

impl GraphStore {
    /// Builds the store for every label the schema declares.
    pub fn new(
        schema: GraphSchema,
        opts: GraphStoreOptions,
        registry: Arc<dyn MetaRegistry>,
    ) -> Result<Self> {
        if opts.partition >= opts.total_partitions {
            return Err(GraphError::Invalid("partition id exceeds partition count"));
        }
        let parser = IdParser::new(
            u64::from(opts.total_partitions),
            u64::from(schema.vertex_label_num()),
        )?;
        let labels = schema.vertex_label_num() as usize;
        let mut vertex_tables = Vec::with_capacity(labels);
        let mut property_stores = Vec::with_capacity(labels);
        let mut graphs = Vec::with_capacity(labels);
        let mut ov_graphs = Vec::with_capacity(labels);
        for vlabel in 0..labels {
            vertex_tables.push(VertexTable::new(opts.vertex_capacity));
            let columns = schema.vertex_columns(VLabelId(vlabel as u32))?;
            if columns.is_empty() {
                property_stores.push(None);
            } else {
                property_stores.push(Some(Arc::new(PagedPropertyStore::new(
                    columns.to_vec(),
                    PagedStoreOptions {
                        max_items: opts.vertex_capacity,
                        rows_per_page: opts.rows_per_page,
                    },
                )?)));
            }
            graphs.push(AdjacencyStore::new(opts.vertex_capacity));
            ov_graphs.push(AdjacencyStore::new(opts.vertex_capacity));
        }
        Ok(Self {
            parser,
            schema,
            vertex_tables,
            property_stores,
            graphs,
            ov_graphs,
            ovl2g: (0..labels).map(|_| RwLock::new(FxHashMap::default())).collect(),
            key_pid: (0..labels).map(|_| RwLock::new(FxHashMap::default())).collect(),
            key_off: (0..labels).map(|_| RwLock::new(FxHashMap::default())).collect(),
            pid_off: (0..labels).map(|_| RwLock::new(FxHashMap::default())).collect(),
            key_lid: (0..labels).map(|_| RwLock::new(FxHashMap::default())).collect(),
            history: BlobHistory::new(),
            registry,
            latest_sealed: AtomicU64::new(EPOCH_UNSET),
            opts,
        })
    }

    /// The partition this store owns.
    pub fn partition(&self) -> u32 {
        self.opts.partition
    }

    /// Total partitions in the deployment.
    pub fn total_partitions(&self) -> u32 {
        self.opts.total_partitions
    }

    /// Shared id codec.
    pub fn parser(&self) -> &IdParser {
        &self.parser
    }

    /// Schema registry.
    pub fn schema(&self) -> &GraphSchema {
        &self.schema
    }

    fn check_vlabel(&self, vlabel: VLabelId) -> Result<usize> {
        if vlabel.index() >= self.vertex_tables.len() {
            return Err(GraphError::OutOfRange("vertex label id"));
        }
        Ok(vlabel.index())
    }

    /// Vertex table of one label.
    pub fn vertex_table(&self, vlabel: VLabelId) -> Result<&VertexTable> {
        let idx = self.check_vlabel(vlabel)?;
        Ok(&self.vertex_tables[idx])
    }

    /// Writable property store of one label.
    pub fn property(&self, vlabel: VLabelId) -> Result<&Arc<PagedPropertyStore>> {
        let idx = self.check_vlabel(vlabel)?;
        self.property_stores[idx]
            .as_ref()
            .ok_or(GraphError::Invalid("label has no property columns"))
    }

    /// Read-only property handle pinned at `version`.
    pub fn property_snapshot(&self, vlabel: VLabelId, version: Version) -> Result<PropertySnapshot> {
        Ok(PropertySnapshot {
            store: Arc::clone(self.property(vlabel)?),
            version,
        })
    }

    /// Out-edges of inner vertices of one label.
    pub fn graph(&self, vlabel: VLabelId) -> Result<&AdjacencyStore> {
        let idx = self.check_vlabel(vlabel)?;
        Ok(&self.graphs[idx])
    }

    /// Out-edges of outer mirrors of one label.
    pub fn ov_graph(&self, vlabel: VLabelId) -> Result<&AdjacencyStore> {
        let idx = self.check_vlabel(vlabel)?;
        Ok(&self.ov_graphs[idx])
    }

    /// Appends an inner vertex.
    pub fn add_inner(&self, vlabel: VLabelId, gid: Gid) -> Result<()> {
        self.vertex_table(vlabel)?.add_inner(gid)
    }

    /// Tombstones the inner vertex with the given embedded offset.
    pub fn delete_inner(&self, vlabel: VLabelId, offset: u64) -> Result<()> {
        let idx = self.check_vlabel(vlabel)?;
        self.vertex_tables[idx].delete_inner(&self.parser, offset)
    }

    /// Appends an outer mirror.
    pub fn add_outer(&self, vlabel: VLabelId, gid: Gid) -> Result<()> {
        self.vertex_table(vlabel)?.add_outer(gid)
    }

    /// Tombstones an outer mirror; a miss is logged and ignored.
    pub fn delete_outer(&self, vlabel: VLabelId, gid: Gid) -> Result<()> {
        self.vertex_table(vlabel)?.delete_outer(gid)
    }

    /// Binds an outer-local offset to its global id.
    pub fn set_ovl2g(&self, vlabel: VLabelId, offset: u64, gid: Gid) -> Result<()> {
        let idx = self.check_vlabel(vlabel)?;
        self.ovl2g[idx].write().insert(offset, gid);
        Ok(())
    }

    /// Global id bound to an outer-local offset.
    pub fn ovl2g(&self, vlabel: VLabelId, offset: u64) -> Option<Gid> {
        self.ovl2g
            .get(vlabel.index())
            .and_then(|m| m.read().get(&offset).copied())
    }

    /// Records the partition and per-partition offset of a key.
    pub fn add_global_off(&self, vlabel: VLabelId, key: u64, pid: u32) -> Result<()> {
        let idx = self.check_vlabel(vlabel)?;
        self.key_pid[idx].write().insert(key, pid);
        let mut pid_off = self.pid_off[idx].write();
        let next = pid_off.entry(pid).or_insert(0);
        let off = *next;
        *next += 1;
        self.key_off[idx].write().insert(key, off);
        Ok(())
    }

    /// Partition and offset previously recorded for a key.
    pub fn get_pid_off(&self, vlabel: VLabelId, key: u64) -> Result<(u32, u64)> {
        let idx = self.check_vlabel(vlabel)?;
        let pid = self.key_pid[idx]
            .read()
            .get(&key)
            .copied()
            .ok_or(GraphError::Invalid("key has no recorded partition"))?;
        let off = self.key_off[idx]
            .read()
            .get(&key)
            .copied()
            .ok_or(GraphError::Invalid("key has no recorded offset"))?;
        Ok((pid, off))
    }

    /// Records the local id of a key.
    pub fn set_lid(&self, vlabel: VLabelId, key: u64, lid: u64) -> Result<()> {
        let idx = self.check_vlabel(vlabel)?;
        self.key_lid[idx].write().insert(key, lid);
        Ok(())
    }

    /// Local id previously recorded for a key.
    pub fn get_lid(&self, vlabel: VLabelId, key: u64) -> Option<u64> {
        self.key_lid
            .get(vlabel.index())
            .and_then(|m| m.read().get(&key).copied())
    }

    /// Flushes every property store's visible-row header.
    pub fn update_offset(&self) {
        for store in self.property_stores.iter().flatten() {
            store.update_header();
        }
    }

    /// Blob schemas describing the current physical state of every label.
    pub fn current_blob_schemas(&self) -> FxHashMap<u32, BlobSchema> {
        let mut schemas = FxHashMap::default();
        for (vlabel, table) in self.vertex_tables.iter().enumerate() {
            let columns = match &self.property_stores[vlabel] {
                Some(store) => store
                    .columns()
                    .iter()
                    .map(|col| {
                        if col.updatable {
                            ColumnBlob::Paged {
                                vlen: col.vlen,
                                rows_per_page: store.rows_per_page(),
                                pages: store.num_pages(),
                            }
                        } else {
                            ColumnBlob::Fixed {
                                vlen: col.vlen,
                                bytes: store.max_items() * col.vlen,
                            }
                        }
                    })
                    .collect(),
                None => Vec::new(),
            };
            let visible_rows = self.property_stores[vlabel]
                .as_ref()
                .map(|s| s.visible_rows())
                .unwrap_or(0);
            schemas.insert(
                vlabel as u32,
                BlobSchema {
                    vlabel: vlabel as u32,
                    vertex_table_size: table.size(),
                    max_inner_location: table.max_inner_location(),
                    min_outer_location: table.min_outer_location(),
                    visible_rows,
                    columns,
                },
            );
        }
        schemas
    }

    /// Seals `epoch`: flushes headers, snapshots blob schemas into history,
    /// and publishes the snapshot and the latest-epoch key.
    ///
    /// Writes at `epoch` become reader-visible only once this returns.
    pub fn update_blob(&self, epoch: Epoch) -> Result<()> {
        self.update_offset();
        let schemas = self.current_blob_schemas();
        self.history.insert(epoch, schemas.clone())?;
        let payload = serde_json::to_string(&schemas.values().collect::<Vec<_>>())?;
        let key = meta::blob_key(
            &self.opts.meta_prefix,
            self.opts.machine,
            self.opts.partition,
            epoch,
        );
        self.registry.put(&key, &payload)?;
        self.registry.put(
            &meta::latest_epoch_key(&self.opts.meta_prefix, self.opts.partition),
            &epoch.to_string(),
        )?;
        self.latest_sealed.store(epoch, Ordering::Release);
        debug!(epoch, partition = self.opts.partition, "store.epoch.sealed");
        Ok(())
    }

    /// Publishes the graph schema JSON for this partition.
    pub fn put_schema(&self) -> Result<()> {
        let payload = self.schema.to_json(self.opts.partition).to_string();
        self.registry.put(
            &meta::schema_key(&self.opts.meta_prefix, self.opts.partition),
            &payload,
        )
    }

    /// Blob schemas recorded at exactly `epoch`.
    pub fn fetch_blob_schema(&self, epoch: Epoch) -> Result<FxHashMap<u32, BlobSchema>> {
        self.history.fetch(epoch)
    }

    /// Latest epoch sealed by [`update_blob`](Self::update_blob).
    pub fn latest_sealed(&self) -> Option<Epoch> {
        match self.latest_sealed.load(Ordering::Acquire) {
            EPOCH_UNSET => None,
            epoch => Some(epoch),
        }
    }

    /// Garbage-collects property versions and history entries older than the
    /// minimum live reader epoch. Returns `(pages_retired, history_dropped)`.
    pub fn gc(&self, min_live: Version) -> (usize, usize) {
        let mut retired = 0usize;
        for store in self.property_stores.iter().flatten() {
            retired += store.gc(min_live);
        }
        let dropped = self.history.gc(min_live);
        (retired, dropped)
    }

    /// Releases pages retired by earlier [`gc`](Self::gc) calls.
    pub fn release_old_pages(&self) -> usize {
        self.property_stores
            .iter()
            .flatten()
            .map(|s| s.release_old_pages())
            .sum()
    }
}
