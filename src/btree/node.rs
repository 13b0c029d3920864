//! B+Tree node view.
//!
//! A node is a page whose type tag is `BTreeLeaf` or `BTreeInternal`. The
//! view holds no state of its own beyond the page guard: key count lives in
//! the header's row-count field, and the key area starts right after the
//! 13-byte header.
//!
//! ```text
//! leaf cell i      @ 13 + 12*i : key (i32) | data pointer (u64)
//! internal cell i  @ 13 +  8*i : key (i32) | child page (u32)
//! ```
//!
//! An internal node with `n` keys has `n + 1` children; the last child sits
//! in cell `n`, whose key field is unused.

use std::ops::{Deref, DerefMut};

use crate::error::{Result, StorageError};
use crate::page::{Page, PageHeader, HEADER_SIZE, NEXT_SIBLING_OFFSET, ROW_COUNT_OFFSET};
use crate::types::{PageId, PageType, RecordId, MAX_KEYS};

const KEY_SIZE: usize = 4;
const DATA_POINTER_SIZE: usize = 8;
const CHILD_POINTER_SIZE: usize = 4;
const LEAF_CELL_SIZE: usize = KEY_SIZE + DATA_POINTER_SIZE;
const INTERNAL_CELL_SIZE: usize = KEY_SIZE + CHILD_POINTER_SIZE;

/// Which half of the node layout applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Internal,
}

/// Typed view of a page as a B+Tree node
pub struct Node<P> {
    page: P,
    kind: NodeKind,
}

impl<P: Deref<Target = Page>> Node<P> {
    /// View a page that is already a B+Tree node
    pub fn open(page: P) -> Result<Self> {
        let kind = match page.page_type() {
            Some(PageType::BTreeLeaf) => NodeKind::Leaf,
            Some(PageType::BTreeInternal) => NodeKind::Internal,
            other => {
                return Err(StorageError::invalid_node(format!(
                    "page {} is not a B+Tree node ({:?})",
                    page.page_id(),
                    other
                )))
            }
        };
        Ok(Self { page, kind })
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    pub fn key_count(&self) -> usize {
        self.page.read_u16(ROW_COUNT_OFFSET) as usize
    }

    /// A node at `2t - 1` keys must be split before anything descends into it
    pub fn is_full(&self) -> bool {
        self.key_count() >= MAX_KEYS
    }

    fn cell_offset(&self, index: usize) -> usize {
        match self.kind {
            NodeKind::Leaf => HEADER_SIZE + index * LEAF_CELL_SIZE,
            NodeKind::Internal => HEADER_SIZE + index * INTERNAL_CELL_SIZE,
        }
    }

    pub fn key(&self, index: usize) -> i32 {
        debug_assert!(index < MAX_KEYS);
        self.page.read_i32(self.cell_offset(index))
    }

    /// All live keys in order
    pub fn keys(&self) -> Vec<i32> {
        (0..self.key_count()).map(|i| self.key(i)).collect()
    }

    /// Record address paired with key `index` (leaf only)
    pub fn data_pointer(&self, index: usize) -> Result<RecordId> {
        if !self.is_leaf() {
            return Err(StorageError::invalid_node(format!(
                "data pointer requested from internal node {}",
                self.page_id()
            )));
        }
        let raw = self.page.read_u64(self.cell_offset(index) + KEY_SIZE);
        Ok(RecordId::from_u64(raw))
    }

    /// Child page at `index` in `0..=key_count` (internal only)
    pub fn child(&self, index: usize) -> Result<PageId> {
        if self.is_leaf() {
            return Err(StorageError::invalid_node(format!(
                "child pointer requested from leaf {}",
                self.page_id()
            )));
        }
        debug_assert!(index <= MAX_KEYS);
        Ok(PageId::new(
            self.page.read_u32(self.cell_offset(index) + KEY_SIZE),
        ))
    }

    /// All `key_count + 1` children (internal only)
    pub fn children(&self) -> Result<Vec<PageId>> {
        (0..=self.key_count()).map(|i| self.child(i)).collect()
    }

    /// Next leaf in key order, NULL for the last leaf (leaf only)
    pub fn next_sibling(&self) -> Result<PageId> {
        if !self.is_leaf() {
            return Err(StorageError::invalid_node(format!(
                "internal node {} has no sibling pointer",
                self.page_id()
            )));
        }
        Ok(PageId::new(self.page.read_u32(NEXT_SIBLING_OFFSET)))
    }

    /// Exact-match binary search over a leaf's keys
    pub fn search(&self, key: i32) -> Option<usize> {
        let mut low = 0;
        let mut high = self.key_count();

        while low < high {
            let mid = low + (high - low) / 2;
            match key.cmp(&self.key(mid)) {
                std::cmp::Ordering::Less => high = mid,
                std::cmp::Ordering::Greater => low = mid + 1,
                std::cmp::Ordering::Equal => return Some(mid),
            }
        }

        None
    }

    /// First index whose key is `>= key` (or `key_count`)
    pub fn insertion_point(&self, key: i32) -> usize {
        let count = self.key_count();
        let mut index = 0;
        while index < count && self.key(index) < key {
            index += 1;
        }
        index
    }

    /// Child slot for `key` in an internal node.
    ///
    /// Child `i` covers `[keys[i-1], keys[i])`, so a key equal to a separator
    /// routes right, where the leaf split copied it.
    pub fn child_index(&self, key: i32) -> usize {
        let count = self.key_count();
        let mut index = 0;
        while index < count && key >= self.key(index) {
            index += 1;
        }
        index
    }
}

impl<P: DerefMut<Target = Page>> Node<P> {
    /// Format a page as an empty leaf
    pub fn init_leaf(mut page: P) -> Self {
        let size = page.size();
        PageHeader::new_node(PageType::BTreeLeaf, size).write(&mut page);
        Self {
            page,
            kind: NodeKind::Leaf,
        }
    }

    /// Format a page as an empty internal node
    pub fn init_internal(mut page: P) -> Self {
        let size = page.size();
        PageHeader::new_node(PageType::BTreeInternal, size).write(&mut page);
        Self {
            page,
            kind: NodeKind::Internal,
        }
    }

    pub fn set_key_count(&mut self, count: usize) {
        debug_assert!(count <= MAX_KEYS);
        self.page.write_u16(ROW_COUNT_OFFSET, count as u16);
    }

    pub fn set_key(&mut self, index: usize, key: i32) {
        debug_assert!(index < MAX_KEYS);
        let offset = self.cell_offset(index);
        self.page.write_i32(offset, key);
    }

    pub fn set_data_pointer(&mut self, index: usize, record: RecordId) -> Result<()> {
        if !self.is_leaf() {
            return Err(StorageError::invalid_node(format!(
                "cannot store a data pointer in internal node {}",
                self.page_id()
            )));
        }
        let offset = self.cell_offset(index) + KEY_SIZE;
        self.page.write_u64(offset, record.to_u64());
        Ok(())
    }

    pub fn set_child(&mut self, index: usize, child: PageId) -> Result<()> {
        if self.is_leaf() {
            return Err(StorageError::invalid_node(format!(
                "cannot store a child pointer in leaf {}",
                self.page_id()
            )));
        }
        debug_assert!(index <= MAX_KEYS);
        let offset = self.cell_offset(index) + KEY_SIZE;
        self.page.write_u32(offset, child.value());
        Ok(())
    }

    pub fn set_next_sibling(&mut self, sibling: PageId) -> Result<()> {
        if !self.is_leaf() {
            return Err(StorageError::invalid_node(format!(
                "cannot link internal node {} into the leaf chain",
                self.page_id()
            )));
        }
        self.page.write_u32(NEXT_SIBLING_OFFSET, sibling.value());
        Ok(())
    }

    fn ensure_room(&self) -> Result<()> {
        if self.is_full() {
            return Err(StorageError::invalid_node(format!(
                "node {} is full",
                self.page_id()
            )));
        }
        Ok(())
    }

    /// Insert a (key, pointer) pair at `index`, shifting later entries right
    pub fn insert_entry(&mut self, index: usize, key: i32, record: RecordId) -> Result<()> {
        self.ensure_room()?;
        let count = self.key_count();
        for i in (index..count).rev() {
            let (k, r) = (self.key(i), self.data_pointer(i)?);
            self.set_key(i + 1, k);
            self.set_data_pointer(i + 1, r)?;
        }
        self.set_key(index, key);
        self.set_data_pointer(index, record)?;
        self.set_key_count(count + 1);
        Ok(())
    }

    /// Remove the pair at `index`, shifting later entries left
    pub fn remove_entry(&mut self, index: usize) -> Result<(i32, RecordId)> {
        let removed = (self.key(index), self.data_pointer(index)?);
        let count = self.key_count();
        for i in index + 1..count {
            let (k, r) = (self.key(i), self.data_pointer(i)?);
            self.set_key(i - 1, k);
            self.set_data_pointer(i - 1, r)?;
        }
        self.set_key_count(count - 1);
        Ok(removed)
    }

    /// Insert separator `key` at `index` with `right_child` just after it
    pub fn insert_separator(&mut self, index: usize, key: i32, right_child: PageId) -> Result<()> {
        self.ensure_room()?;
        let count = self.key_count();
        for i in (index..count).rev() {
            let k = self.key(i);
            self.set_key(i + 1, k);
        }
        for i in (index + 1..=count).rev() {
            let c = self.child(i)?;
            self.set_child(i + 1, c)?;
        }
        self.set_key(index, key);
        self.set_child(index + 1, right_child)?;
        self.set_key_count(count + 1);
        Ok(())
    }

    /// Remove separator `index` and the child to its right
    pub fn remove_separator(&mut self, index: usize) -> Result<(i32, PageId)> {
        let removed = (self.key(index), self.child(index + 1)?);
        let count = self.key_count();
        for i in index + 1..count {
            let k = self.key(i);
            self.set_key(i - 1, k);
        }
        for i in index + 2..=count {
            let c = self.child(i)?;
            self.set_child(i - 1, c)?;
        }
        self.set_key_count(count - 1);
        Ok(removed)
    }

    /// Prepend a key and a leftmost child (internal only)
    pub fn push_front(&mut self, key: i32, child: PageId) -> Result<()> {
        self.ensure_room()?;
        let count = self.key_count();
        for i in (0..count).rev() {
            let k = self.key(i);
            self.set_key(i + 1, k);
        }
        for i in (0..=count).rev() {
            let c = self.child(i)?;
            self.set_child(i + 1, c)?;
        }
        self.set_key(0, key);
        self.set_child(0, child)?;
        self.set_key_count(count + 1);
        Ok(())
    }

    /// Remove the first key and the leftmost child (internal only)
    pub fn pop_front(&mut self) -> Result<(i32, PageId)> {
        let removed = (self.key(0), self.child(0)?);
        let count = self.key_count();
        for i in 1..count {
            let k = self.key(i);
            self.set_key(i - 1, k);
        }
        for i in 1..=count {
            let c = self.child(i)?;
            self.set_child(i - 1, c)?;
        }
        self.set_key_count(count - 1);
        Ok(removed)
    }

    /// Append a key and a rightmost child (internal only)
    pub fn push_back(&mut self, key: i32, child: PageId) -> Result<()> {
        self.ensure_room()?;
        let count = self.key_count();
        self.set_key(count, key);
        self.set_child(count + 1, child)?;
        self.set_key_count(count + 1);
        Ok(())
    }
}
