//! B+Tree cursor for in-order iteration.
//!
//! The cursor holds a position (leaf page, entry index) and follows the
//! leaf chain forward. It does not pin pages between calls, so mutating
//! the tree while a cursor is open leaves the cursor's position undefined.

use crate::buffer::Pager;
use crate::error::Result;
use crate::types::{PageId, RecordId};
use std::sync::Arc;

use super::node::Node;
use super::tree::BTree;

/// A cursor over the (key, record address) entries of one tree
pub struct Cursor {
    pager: Arc<Pager>,
    leaf: PageId,
    index: usize,
}

impl Cursor {
    /// Position at the smallest key in the tree
    pub fn first(pager: Arc<Pager>, tree: &BTree) -> Result<Self> {
        let leaf = tree.first_leaf()?;
        let mut cursor = Self {
            pager,
            leaf,
            index: 0,
        };
        cursor.skip_exhausted()?;
        Ok(cursor)
    }

    /// Position at the first key `>= key`
    pub fn seek(pager: Arc<Pager>, tree: &BTree, key: i32) -> Result<Self> {
        let leaf = tree.find_leaf(key)?;
        let index = {
            let handle = pager.fetch(leaf)?;
            let node = Node::open(handle.read())?;
            node.insertion_point(key)
        };
        let mut cursor = Self { pager, leaf, index };
        cursor.skip_exhausted()?;
        Ok(cursor)
    }

    /// True once the last entry of the last leaf has been passed
    pub fn is_end(&self) -> bool {
        self.leaf.is_null()
    }

    /// Key and record address at the current position
    pub fn current(&self) -> Result<Option<(i32, RecordId)>> {
        if self.is_end() {
            return Ok(None);
        }
        let handle = self.pager.fetch(self.leaf)?;
        let node = Node::open(handle.read())?;
        Ok(Some((node.key(self.index), node.data_pointer(self.index)?)))
    }

    /// Step to the next entry, crossing into the next leaf when needed
    pub fn advance(&mut self) -> Result<()> {
        if self.is_end() {
            return Ok(());
        }
        self.index += 1;
        self.skip_exhausted()
    }

    /// Move past leaves whose entries are used up
    fn skip_exhausted(&mut self) -> Result<()> {
        while !self.leaf.is_null() {
            let handle = self.pager.fetch(self.leaf)?;
            let node = Node::open(handle.read())?;
            if self.index < node.key_count() {
                return Ok(());
            }
            self.leaf = node.next_sibling()?;
            self.index = 0;
        }
        Ok(())
    }
}

impl Iterator for Cursor {
    type Item = Result<(i32, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current() {
            Ok(Some(entry)) => match self.advance() {
                Ok(()) => Some(Ok(entry)),
                Err(e) => Some(Err(e)),
            },
            Ok(None) => None,
            Err(e) => {
                // stop after reporting the error once
                self.leaf = PageId::NULL;
                Some(Err(e))
            }
        }
    }
}
