//! Versioned paged columnar property store.
//!
//! One store holds the property records of a single vertex label. Columns
//! come in two physical shapes:
//!
//! - non-updatable columns are flat arrays sized by `max_items`, carrying a
//!   single version (write-once at insert);
//! - updatable columns are split into pages of `rows_per_page` rows, and each
//!   page number owns a chain of immutable-once-published page snapshots,
//!   newest first, strictly descending by version.
//!
//! Readers walk chains without blocking writers: a chain head is published by
//! a single pointer swap after the page is fully initialized, and retired
//! pages stay alive while any reader still holds them (`Arc` reclaim).
//! Writers to the same page number serialize on that page's mutex; writers to
//! distinct page numbers proceed in parallel.
#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::error::{GraphError, Result};
use crate::schema::PropertyColumn;
use crate::types::{SeqNum, Version};

/// Sizing knobs for one store.
#[derive(Debug, Clone, Copy)]
pub struct PagedStoreOptions {
    /// Maximum number of logical rows the store can address.
    pub max_items: usize,
    /// Rows per page in updatable columns.
    pub rows_per_page: usize,
}

impl Default for PagedStoreOptions {
    fn default() -> Self {
        Self {
            max_items: 1 << 20,
            rows_per_page: 1024,
        }
    }
}

/// One multi-version snapshot of a page's rows.
///
/// `ver` is fixed at allocation. `min_ver` tracks the oldest version still
/// reachable through `prev` and is maintained under the page-number mutex.
pub struct Page {
    ver: Version,
    min_ver: AtomicU64,
    prev: RwLock<Option<Arc<Page>>>,
    rows: RwLock<Vec<u8>>,
}

impl Page {
    fn alloc(ver: Version, nbytes: usize, prev: Option<Arc<Page>>) -> Arc<Page> {
        // Copy the predecessor's rows forward so the new snapshot starts as
        // an exact image of the chain head it replaces.
        let rows = match &prev {
            Some(p) => p.rows.read().clone(),
            None => vec![0u8; nbytes],
        };
        let min_ver = prev.as_ref().map(|p| p.min_ver()).unwrap_or(ver);
        Arc::new(Page {
            ver,
            min_ver: AtomicU64::new(min_ver),
            prev: RwLock::new(prev),
            rows: RwLock::new(rows),
        })
    }

    /// Version this snapshot was written at.
    pub fn ver(&self) -> Version {
        self.ver
    }

    /// Oldest version reachable from this page through `prev`.
    pub fn min_ver(&self) -> Version {
        self.min_ver.load(Ordering::Acquire)
    }

    /// Copies one row out of the snapshot.
    pub fn row(&self, slot: usize, vlen: usize) -> Vec<u8> {
        let rows = self.rows.read();
        rows[slot * vlen..(slot + 1) * vlen].to_vec()
    }

    /// Copies the whole page image.
    pub fn snapshot_rows(&self) -> Vec<u8> {
        self.rows.read().clone()
    }

    fn write_slot(&self, slot: usize, value: &[u8]) {
        let mut rows = self.rows.write();
        rows[slot * value.len()..(slot + 1) * value.len()].copy_from_slice(value);
    }
}

struct FlexCol {
    heads: Vec<RwLock<Option<Arc<Page>>>>,
    page_locks: Vec<Mutex<()>>,
    old_pages: Mutex<Vec<Arc<Page>>>,
}

impl FlexCol {
    fn new(num_pages: usize) -> Self {
        Self {
            heads: (0..num_pages).map(|_| RwLock::new(None)).collect(),
            page_locks: (0..num_pages).map(|_| Mutex::new(())).collect(),
            old_pages: Mutex::new(Vec::new()),
        }
    }
}

/// Counters exposed for observability; mirrors the reader walk hook.
#[derive(Default)]
pub struct StoreMetrics {
    page_walks: AtomicU64,
    pages_allocated: AtomicU64,
    pages_retired: AtomicU64,
    coalesced_writes: AtomicU64,
}

/// Point-in-time copy of [`StoreMetrics`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreMetricsSnapshot {
    /// Chain links traversed by readers.
    pub page_walks: u64,
    /// Pages allocated as new chain heads.
    pub pages_allocated: u64,
    /// Pages detached by garbage collection.
    pub pages_retired: u64,
    /// Writes absorbed in place by a same-version head.
    pub coalesced_writes: u64,
}

impl StoreMetrics {
    fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            page_walks: self.page_walks.load(Ordering::Relaxed),
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
            pages_retired: self.pages_retired.load(Ordering::Relaxed),
            coalesced_writes: self.coalesced_writes.load(Ordering::Relaxed),
        }
    }
}

/// Pages a reader splices to observe one column at a version.
pub enum ColumnPages {
    /// Non-updatable column: the covered range of the flat buffer.
    Flat(Vec<u8>),
    /// Updatable column: one chosen page per covered page number; `None`
    /// where the version predates every write to that page.
    Chains(Vec<Option<Arc<Page>>>),
}

/// Versioned property store for one vertex label.
pub struct PagedPropertyStore {
    cols: Vec<PropertyColumn>,
    prefix_bytes: Vec<usize>,
    record_bytes: usize,
    rows_per_page: usize,
    max_items: usize,
    num_pages: usize,
    fixed: Vec<Option<RwLock<Vec<u8>>>>,
    flex: Vec<Option<FlexCol>>,
    keys: RwLock<Vec<u64>>,
    header: AtomicU64,
    pending_rows: AtomicU64,
    metrics: StoreMetrics,
}

impl PagedPropertyStore {
    /// Builds a store for the given column layout.
    pub fn new(cols: Vec<PropertyColumn>, opts: PagedStoreOptions) -> Result<Self> {
        if opts.rows_per_page == 0 || opts.max_items == 0 {
            return Err(GraphError::Invalid("store sizing must be positive"));
        }
        let num_pages = opts.max_items.div_ceil(opts.rows_per_page);
        let mut prefix_bytes = Vec::with_capacity(cols.len());
        let mut record_bytes = 0usize;
        let mut fixed = Vec::with_capacity(cols.len());
        let mut flex = Vec::with_capacity(cols.len());
        for col in &cols {
            if col.vlen == 0 {
                return Err(GraphError::Invalid("column width must be positive"));
            }
            prefix_bytes.push(record_bytes);
            record_bytes += col.vlen;
            if col.updatable {
                fixed.push(None);
                flex.push(Some(FlexCol::new(num_pages)));
            } else {
                fixed.push(Some(RwLock::new(vec![0u8; opts.max_items * col.vlen])));
                flex.push(None);
            }
        }
        Ok(Self {
            cols,
            prefix_bytes,
            record_bytes,
            rows_per_page: opts.rows_per_page,
            max_items: opts.max_items,
            num_pages,
            fixed,
            flex,
            keys: RwLock::new(Vec::new()),
            header: AtomicU64::new(0),
            pending_rows: AtomicU64::new(0),
            metrics: StoreMetrics::default(),
        })
    }

    /// Column layout of this store.
    pub fn columns(&self) -> &[PropertyColumn] {
        &self.cols
    }

    /// Byte stride of one full property record.
    pub fn record_bytes(&self) -> usize {
        self.record_bytes
    }

    /// Rows per page in updatable columns.
    pub fn rows_per_page(&self) -> usize {
        self.rows_per_page
    }

    /// Maximum addressable row count.
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Number of page slots per updatable column.
    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    /// Writes every column of logical row `offset` from a full record.
    pub fn insert(
        &self,
        offset: u64,
        key: u64,
        record: &[u8],
        seq: SeqNum,
        ver: Version,
    ) -> Result<()> {
        self.check_offset(offset)?;
        if record.len() != self.record_bytes {
            return Err(GraphError::Invalid("record length mismatch"));
        }
        for (cid, col) in self.cols.iter().enumerate() {
            let cell = &record[self.prefix_bytes[cid]..self.prefix_bytes[cid] + col.vlen];
            match &self.flex[cid] {
                Some(flex) => self.write_cell(cid, flex, offset, cell, ver)?,
                None => self.write_fixed(cid, offset, cell),
            }
        }
        {
            let mut keys = self.keys.write();
            if keys.len() <= offset as usize {
                keys.resize(offset as usize + 1, 0);
            }
            keys[offset as usize] = key;
        }
        self.pending_rows.fetch_max(seq, Ordering::AcqRel);
        Ok(())
    }

    /// Rewrites the selected updatable columns of `offset` from a full record.
    pub fn update(
        &self,
        offset: u64,
        col_ids: &[usize],
        record: &[u8],
        seq: SeqNum,
        ver: Version,
    ) -> Result<()> {
        self.check_offset(offset)?;
        if record.len() != self.record_bytes {
            return Err(GraphError::Invalid("record length mismatch"));
        }
        for &cid in col_ids {
            let col = self.col(cid)?;
            let flex = self.flex[cid]
                .as_ref()
                .ok_or(GraphError::NotUpdatable(cid))?;
            let cell = &record[self.prefix_bytes[cid]..self.prefix_bytes[cid] + col.vlen];
            self.write_cell(cid, flex, offset, cell, ver)?;
        }
        self.pending_rows.fetch_max(seq, Ordering::AcqRel);
        Ok(())
    }

    /// Rewrites a single updatable column cell.
    pub fn update_one(&self, offset: u64, cid: usize, value: &[u8], ver: Version) -> Result<()> {
        self.check_offset(offset)?;
        let col = self.col(cid)?;
        if value.len() != col.vlen {
            return Err(GraphError::Invalid("cell length mismatch"));
        }
        let flex = self.flex[cid]
            .as_ref()
            .ok_or(GraphError::NotUpdatable(cid))?;
        self.write_cell(cid, flex, offset, value, ver)
    }

    /// Reads the newest cell of `(offset, cid)` visible at `ver`.
    ///
    /// Returns the default (all-zero) cell when the version predates every
    /// write to the row's page.
    pub fn get(&self, offset: u64, cid: usize, ver: Version) -> Result<Vec<u8>> {
        self.check_offset(offset)?;
        let col = self.col(cid)?;
        match &self.flex[cid] {
            None => {
                let buf = self.fixed[cid].as_ref().expect("fixed column").read();
                let start = offset as usize * col.vlen;
                Ok(buf[start..start + col.vlen].to_vec())
            }
            Some(flex) => {
                let page_num = offset as usize / self.rows_per_page;
                let slot = offset as usize % self.rows_per_page;
                match self.find_page(flex, page_num, ver) {
                    Some(page) => Ok(page.row(slot, col.vlen)),
                    None => Ok(vec![0u8; col.vlen]),
                }
            }
        }
    }

    /// Pages covering rows `[start, start + count)` of one column at `ver`.
    pub fn column_pages(
        &self,
        cid: usize,
        start: u64,
        count: usize,
        ver: Version,
    ) -> Result<ColumnPages> {
        let col = self.col(cid)?;
        let end = start as usize + count;
        if end > self.max_items {
            return Err(GraphError::OutOfRange("row range"));
        }
        match &self.flex[cid] {
            None => {
                let buf = self.fixed[cid].as_ref().expect("fixed column").read();
                Ok(ColumnPages::Flat(
                    buf[start as usize * col.vlen..end * col.vlen].to_vec(),
                ))
            }
            Some(flex) => {
                let first = start as usize / self.rows_per_page;
                let last = (end + self.rows_per_page - 1) / self.rows_per_page;
                let pages = (first..last)
                    .map(|pn| self.find_page(flex, pn, ver))
                    .collect();
                Ok(ColumnPages::Chains(pages))
            }
        }
    }

    /// Row cursor over one column pinned at `ver`.
    ///
    /// The cursor initially covers the rows visible at the last sealed
    /// header; use [`ColumnCursor::seek`] to narrow or widen the range.
    pub fn cursor(&self, cid: usize, ver: Version) -> Result<ColumnCursor<'_>> {
        let col = self.col(cid)?;
        Ok(ColumnCursor {
            store: self,
            cid,
            vlen: col.vlen,
            updatable: col.updatable,
            ver,
            cur: 0,
            end: self.visible_rows(),
            page: None,
            page_num: 0,
            page_valid: false,
        })
    }

    /// Detaches chain pages no reader at `min_live_ver` or newer can need.
    ///
    /// Kept: the head down through the newest page with `ver <=
    /// min_live_ver`. Everything older moves to the retired list and awaits
    /// [`release_old_pages`](Self::release_old_pages).
    pub fn gc(&self, min_live_ver: Version) -> usize {
        let mut retired = 0usize;
        for flex in self.flex.iter().flatten() {
            for page_num in 0..self.num_pages {
                let _guard = flex.page_locks[page_num].lock();
                let head = flex.heads[page_num].read().clone();
                let Some(head) = head else { continue };
                if head.min_ver() > min_live_ver {
                    // Every page in this chain is still the newest candidate
                    // for some live reader version.
                    continue;
                }
                let mut keep = head.clone();
                while keep.ver() > min_live_ver {
                    let next = keep.prev.read().clone();
                    match next {
                        Some(p) => keep = p,
                        None => break,
                    }
                }
                if keep.ver() > min_live_ver {
                    continue;
                }
                let mut detached = keep.prev.write().take();
                let mut old = flex.old_pages.lock();
                while let Some(page) = detached {
                    detached = page.prev.write().take();
                    old.push(page);
                    retired += 1;
                }
                head.min_ver.store(keep.ver(), Ordering::Release);
            }
        }
        if retired > 0 {
            self.metrics
                .pages_retired
                .fetch_add(retired as u64, Ordering::Relaxed);
            trace!(retired, min_live_ver, "store.gc.retired");
        }
        retired
    }

    /// Drops the retired-page list. Backing memory returns once in-flight
    /// readers release their last references.
    pub fn release_old_pages(&self) -> usize {
        let mut released = 0usize;
        for flex in self.flex.iter().flatten() {
            released += std::mem::take(&mut *flex.old_pages.lock()).len();
        }
        released
    }

    /// Number of retired pages currently held.
    pub fn old_page_count(&self) -> usize {
        self.flex
            .iter()
            .flatten()
            .map(|f| f.old_pages.lock().len())
            .sum()
    }

    /// Chain length for one `(column, page_number)`; zero when unwritten.
    pub fn chain_len(&self, cid: usize, page_num: usize) -> usize {
        let Some(flex) = self.flex.get(cid).and_then(|f| f.as_ref()) else {
            return 0;
        };
        let mut len = 0usize;
        let mut cur = flex.heads[page_num].read().clone();
        while let Some(page) = cur {
            len += 1;
            cur = page.prev.read().clone();
        }
        len
    }

    /// Flushes the pending row watermark into the reader-visible header.
    pub fn update_header(&self) {
        let pending = self.pending_rows.load(Ordering::Acquire);
        self.header.store(pending, Ordering::Release);
    }

    /// Rows visible as of the last [`update_header`](Self::update_header).
    pub fn visible_rows(&self) -> u64 {
        self.header.load(Ordering::Acquire)
    }

    /// Key recorded for a row at insert time.
    pub fn key_at(&self, offset: u64) -> Option<u64> {
        self.keys.read().get(offset as usize).copied()
    }

    /// Copy of the current metric counters.
    pub fn metrics_snapshot(&self) -> StoreMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn col(&self, cid: usize) -> Result<&PropertyColumn> {
        self.cols.get(cid).ok_or(GraphError::OutOfRange("column id"))
    }

    fn check_offset(&self, offset: u64) -> Result<()> {
        if offset as usize >= self.max_items {
            return Err(GraphError::OutOfRange("row offset"));
        }
        Ok(())
    }

    fn write_fixed(&self, cid: usize, offset: u64, cell: &[u8]) {
        let mut buf = self.fixed[cid].as_ref().expect("fixed column").write();
        let start = offset as usize * cell.len();
        buf[start..start + cell.len()].copy_from_slice(cell);
    }

    fn write_cell(
        &self,
        cid: usize,
        flex: &FlexCol,
        offset: u64,
        cell: &[u8],
        ver: Version,
    ) -> Result<()> {
        let page_num = offset as usize / self.rows_per_page;
        let slot = offset as usize % self.rows_per_page;
        let _guard = flex.page_locks[page_num].lock();
        let head = flex.heads[page_num].read().clone();
        match head {
            Some(h) if h.ver() == ver => {
                h.write_slot(slot, cell);
                self.metrics.coalesced_writes.fetch_add(1, Ordering::Relaxed);
            }
            Some(h) if h.ver() > ver => {
                return Err(GraphError::Invalid("write version below chain head"));
            }
            other => {
                let nbytes = self.rows_per_page * cell.len();
                let page = Page::alloc(ver, nbytes, other);
                page.write_slot(slot, cell);
                // Publish only after the page is fully initialized; readers
                // either see the old head or the complete new one.
                *flex.heads[page_num].write() = Some(page);
                self.metrics.pages_allocated.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn find_page(&self, flex: &FlexCol, page_num: usize, ver: Version) -> Option<Arc<Page>> {
        let mut cur = flex.heads[page_num].read().clone()?;
        if cur.min_ver() > ver {
            return None;
        }
        loop {
            if cur.ver() <= ver {
                return Some(cur);
            }
            self.metrics.page_walks.fetch_add(1, Ordering::Relaxed);
            let prev = cur.prev.read().clone()?;
            cur = prev;
        }
    }
}

/// Row cursor over one column, pinned at a version.
pub struct ColumnCursor<'a> {
    store: &'a PagedPropertyStore,
    cid: usize,
    vlen: usize,
    updatable: bool,
    ver: Version,
    cur: u64,
    end: u64,
    page: Option<Arc<Page>>,
    page_num: usize,
    page_valid: bool,
}

impl<'a> ColumnCursor<'a> {
    /// Restricts the cursor to rows `[begin, end)`.
    pub fn seek(&mut self, begin: u64, end: u64) {
        self.cur = begin;
        self.end = end.min(self.store.max_items as u64);
        self.page_valid = false;
    }

    /// Yields the next `(row, cell)` pair, or `None` past the end.
    pub fn next_row(&mut self) -> Option<(u64, Vec<u8>)> {
        if self.cur >= self.end {
            return None;
        }
        let row = self.cur;
        self.cur += 1;
        if !self.updatable {
            let buf = self.store.fixed[self.cid]
                .as_ref()
                .expect("fixed column")
                .read();
            let start = row as usize * self.vlen;
            return Some((row, buf[start..start + self.vlen].to_vec()));
        }
        let page_num = row as usize / self.store.rows_per_page;
        if !self.page_valid || page_num != self.page_num {
            let flex = self.store.flex[self.cid].as_ref().expect("flex column");
            self.page = self.store.find_page(flex, page_num, self.ver);
            self.page_num = page_num;
            self.page_valid = true;
        }
        let slot = row as usize % self.store.rows_per_page;
        let cell = match &self.page {
            Some(page) => page.row(slot, self.vlen),
            None => vec![0u8; self.vlen],
        };
        Some((row, cell))
    }
}
