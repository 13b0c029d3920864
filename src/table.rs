//! Tables: a B+Tree index plus a chain of data pages.
//!
//! Each table owns two structures in the shared file:
//! - a B+Tree keyed by `i32`, whose leaves hold record addresses
//! - a singly linked chain of data pages holding the encoded records
//!
//! Records are appended to the first data page with room; deleting a row
//! tombstones its slot without reclaiming the bytes.

use std::sync::Arc;
use tracing::debug;

use crate::btree::{BTree, Cursor, TreeNode};
use crate::buffer::Pager;
use crate::error::{Result, StorageError};
use crate::page::{Page, SlottedPage};
use crate::record::{self, Row, Schema};
use crate::types::{PageId, RecordId};

/// An open table
pub struct Table {
    name: String,
    pager: Arc<Pager>,
    tree: BTree,
    first_data_page: PageId,
    schema: Schema,
    write_through: bool,
}

impl Table {
    /// Allocate an empty tree root and an empty data page for a new table
    pub fn create(
        pager: Arc<Pager>,
        name: impl Into<String>,
        schema: Schema,
        write_through: bool,
    ) -> Result<Self> {
        let name = name.into();
        let tree = BTree::create(Arc::clone(&pager))?;
        let data = pager.allocate()?;
        let first_data_page = data.page_id();
        SlottedPage::initialize(data.write());

        debug!(table = %name, root = %tree.root_page(), data = %first_data_page, "created table storage");
        Ok(Self {
            name,
            pager,
            tree,
            first_data_page,
            schema,
            write_through,
        })
    }

    /// Attach to a table whose pages already exist
    pub fn open(
        pager: Arc<Pager>,
        name: impl Into<String>,
        root_page: PageId,
        first_data_page: PageId,
        schema: Schema,
        write_through: bool,
    ) -> Self {
        Self {
            name: name.into(),
            tree: BTree::open(Arc::clone(&pager), root_page),
            pager,
            first_data_page,
            schema,
            write_through,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current root of the tree; changes on root split and collapse
    pub fn root_page(&self) -> PageId {
        self.tree.root_page()
    }

    pub fn first_data_page(&self) -> PageId {
        self.first_data_page
    }

    pub fn height(&self) -> Result<usize> {
        self.tree.height()
    }

    /// Snapshot of the tree shape
    pub fn export_tree(&self) -> Result<TreeNode> {
        self.tree.export()
    }

    /// Check the tree's structural invariants
    pub fn validate(&self) -> Result<()> {
        self.tree.validate()
    }

    // ----- rows -----

    /// Insert a row under `key`
    pub fn insert(&mut self, key: i32, row: &Row) -> Result<()> {
        let bytes = record::encode(row, &self.schema)?;
        self.insert_record(key, &bytes)
    }

    /// Fetch and decode the row stored under `key`
    pub fn find(&self, key: i32) -> Result<Option<Row>> {
        match self.find_record(key)? {
            Some(bytes) => Ok(Some(record::decode(&bytes, &self.schema)?)),
            None => Ok(None),
        }
    }

    /// Remove the row stored under `key`; false if there was none
    pub fn delete(&mut self, key: i32) -> Result<bool> {
        self.delete_record(key)
    }

    /// Replace the row under `key` by deleting and re-inserting it.
    ///
    /// Returns false without inserting when the key is absent. The two
    /// steps are not atomic.
    pub fn update(&mut self, key: i32, row: &Row) -> Result<bool> {
        let bytes = record::encode(row, &self.schema)?;
        self.check_record_size(&bytes)?;
        if !self.delete_record(key)? {
            return Ok(false);
        }
        self.insert_record(key, &bytes)?;
        Ok(true)
    }

    /// Cursor at the smallest key
    pub fn start(&self) -> Result<RowCursor<'_>> {
        Ok(RowCursor {
            table: self,
            inner: Cursor::first(Arc::clone(&self.pager), &self.tree)?,
        })
    }

    /// Cursor at the first key `>= key`
    pub fn seek(&self, key: i32) -> Result<RowCursor<'_>> {
        Ok(RowCursor {
            table: self,
            inner: Cursor::seek(Arc::clone(&self.pager), &self.tree, key)?,
        })
    }

    /// Rows with `start <= key < end`, either bound optional
    pub fn scan(&self, start: Option<i32>, end: Option<i32>) -> Result<Vec<(i32, Row)>> {
        let cursor = match start {
            Some(key) => self.seek(key)?,
            None => self.start()?,
        };

        let mut rows = Vec::new();
        for entry in cursor {
            let (key, row) = entry?;
            if end.map_or(false, |end| key >= end) {
                break;
            }
            rows.push((key, row));
        }
        Ok(rows)
    }

    // ----- raw records -----

    /// Store pre-encoded bytes under `key`
    pub fn insert_record(&mut self, key: i32, bytes: &[u8]) -> Result<()> {
        self.check_record_size(bytes)?;
        if self.tree.search(key)?.is_some() {
            return Err(StorageError::DuplicateKey(key));
        }

        let record = self.append_record(bytes)?;
        self.tree.insert(key, record)?;
        self.finish_write()
    }

    /// Record address stored under `key`
    pub fn locate(&self, key: i32) -> Result<Option<RecordId>> {
        self.tree.search(key)
    }

    /// Raw bytes stored under `key`
    pub fn find_record(&self, key: i32) -> Result<Option<Vec<u8>>> {
        match self.tree.search(key)? {
            Some(record) => Ok(Some(self.read_record(record)?)),
            None => Ok(None),
        }
    }

    /// Remove `key` from the tree and tombstone its record
    pub fn delete_record(&mut self, key: i32) -> Result<bool> {
        if self.tree.search(key)?.is_none() {
            return Ok(false);
        }

        let record = match self.tree.delete(key)? {
            Some(record) => record,
            None => return Ok(false),
        };

        {
            let handle = self.pager.fetch(record.page_id)?;
            let mut page = SlottedPage::open(handle.write())?;
            page.delete_record(record.slot)?;
        }
        self.finish_write()?;
        Ok(true)
    }

    /// Overwrite the record under `key` in place; the length must not change
    pub fn overwrite_record(&mut self, key: i32, bytes: &[u8]) -> Result<bool> {
        let record = match self.tree.search(key)? {
            Some(record) => record,
            None => return Ok(false),
        };

        {
            let handle = self.pager.fetch(record.page_id)?;
            let mut page = SlottedPage::open(handle.write())?;
            page.update_record(record.slot, bytes)?;
        }
        self.finish_write()?;
        Ok(true)
    }

    /// Copy out the record at a physical address
    pub fn read_record(&self, record: RecordId) -> Result<Vec<u8>> {
        let handle = self.pager.fetch(record.page_id)?;
        let page = SlottedPage::open(handle.read())?;
        page.get_record(record.slot)
    }

    /// Cursor over (key, record address) pairs
    pub fn entries(&self) -> Result<Cursor> {
        Cursor::first(Arc::clone(&self.pager), &self.tree)
    }

    pub(crate) fn check_record_size(&self, bytes: &[u8]) -> Result<()> {
        let max = SlottedPage::<&Page>::max_record_size(self.pager.page_size());
        if bytes.len() > max {
            return Err(StorageError::RecordTooLarge {
                size: bytes.len(),
                max,
            });
        }
        Ok(())
    }

    /// Append bytes to the first data page with room, extending the chain
    /// with a fresh page when every page is full
    fn append_record(&mut self, bytes: &[u8]) -> Result<RecordId> {
        let mut current = self.first_data_page;
        loop {
            let handle = self.pager.fetch(current)?;
            let mut page = SlottedPage::open(handle.write())?;
            match page.add_record(bytes) {
                Ok(slot) => return Ok(RecordId::new(current, slot)),
                Err(StorageError::InsufficientSpace { .. }) => {}
                Err(e) => return Err(e),
            }

            match page.next_data_page().non_null() {
                Some(next) => current = next,
                None => {
                    let fresh = self.pager.allocate()?;
                    let fresh_id = fresh.page_id();
                    let slot = SlottedPage::initialize(fresh.write()).add_record(bytes)?;
                    page.set_next_data_page(fresh_id);
                    debug!(table = %self.name, page = %fresh_id, "extended data chain");
                    return Ok(RecordId::new(fresh_id, slot));
                }
            }
        }
    }

    /// Write every dirty page back when running write-through
    fn finish_write(&self) -> Result<()> {
        if self.write_through {
            self.pager.flush_dirty()?;
        }
        Ok(())
    }
}

/// Cursor yielding decoded rows in key order
pub struct RowCursor<'a> {
    table: &'a Table,
    inner: Cursor,
}

impl RowCursor<'_> {
    pub fn is_end_of_table(&self) -> bool {
        self.inner.is_end()
    }

    pub fn current_key(&self) -> Result<Option<i32>> {
        Ok(self.inner.current()?.map(|(key, _)| key))
    }

    /// Decoded row at the current position
    pub fn current_record(&self) -> Result<Option<Row>> {
        match self.inner.current()? {
            Some((_, record)) => {
                let bytes = self.table.read_record(record)?;
                Ok(Some(record::decode(&bytes, &self.table.schema)?))
            }
            None => Ok(None),
        }
    }

    pub fn advance(&mut self) -> Result<()> {
        self.inner.advance()
    }
}

impl Iterator for RowCursor<'_> {
    type Item = Result<(i32, Row)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, record) = match self.inner.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };
        Some(
            self.table
                .read_record(record)
                .and_then(|bytes| record::decode(&bytes, &self.table.schema))
                .map(|row| (key, row)),
        )
    }
}
