//! B+Tree core implementation.
//!
//! Keys are `i32` and each leaf entry points at a record in the table's data
//! chain. The tree keeps the classic CLRS shape with minimum degree `t`:
//! - insert splits full nodes on the way down, so a leaf always has room
//! - delete fixes minimal children on the way down, so removal never
//!   underflows a node
//!
//! Leaves are linked left to right for in-order scans. Pages are never
//! freed: a merged-away node stays allocated but unreachable.

use crate::buffer::Pager;
use crate::error::{Result, StorageError};
use crate::types::{PageId, RecordId, MAX_KEYS, MIN_DEGREE, MIN_KEYS};
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

use super::node::Node;

/// Serializable snapshot of one node and its subtree
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Page number of the node
    pub page_id: u32,
    /// Whether this is a leaf node
    pub is_leaf: bool,
    /// Keys in this node
    pub keys: Vec<i32>,
    /// Child nodes (only for internal nodes)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

/// A disk-resident B+Tree mapping keys to record addresses
pub struct BTree {
    pager: Arc<Pager>,
    root_page: PageId,
}

impl BTree {
    /// Allocate an empty leaf as the root of a new tree
    pub fn create(pager: Arc<Pager>) -> Result<Self> {
        let root = pager.allocate()?;
        let root_page = root.page_id();
        Node::init_leaf(root.write());
        Ok(Self { pager, root_page })
    }

    /// Attach to an existing tree
    pub fn open(pager: Arc<Pager>, root_page: PageId) -> Self {
        Self { pager, root_page }
    }

    pub fn root_page(&self) -> PageId {
        self.root_page
    }

    /// Number of levels, counting the root leaf as 1
    pub fn height(&self) -> Result<usize> {
        let mut height = 1;
        let mut current = self.root_page;
        loop {
            let handle = self.pager.fetch(current)?;
            let node = Node::open(handle.read())?;
            if node.is_leaf() {
                return Ok(height);
            }
            current = node.child(0)?;
            height += 1;
        }
    }

    /// Look up the record address stored under `key`
    pub fn search(&self, key: i32) -> Result<Option<RecordId>> {
        let leaf_id = self.find_leaf(key)?;
        let handle = self.pager.fetch(leaf_id)?;
        let leaf = Node::open(handle.read())?;
        match leaf.search(key) {
            Some(index) => Ok(Some(leaf.data_pointer(index)?)),
            None => Ok(None),
        }
    }

    /// Leaf whose key range covers `key`
    pub fn find_leaf(&self, key: i32) -> Result<PageId> {
        let mut current = self.root_page;
        loop {
            let handle = self.pager.fetch(current)?;
            let node = Node::open(handle.read())?;
            if node.is_leaf() {
                return Ok(current);
            }
            current = node.child(node.child_index(key))?;
        }
    }

    /// Leftmost leaf, where an in-order scan begins
    pub fn first_leaf(&self) -> Result<PageId> {
        let mut current = self.root_page;
        loop {
            let handle = self.pager.fetch(current)?;
            let node = Node::open(handle.read())?;
            if node.is_leaf() {
                return Ok(current);
            }
            current = node.child(0)?;
        }
    }

    /// Insert a key. Duplicate keys are rejected.
    pub fn insert(&mut self, key: i32, record: RecordId) -> Result<()> {
        let root_full = {
            let handle = self.pager.fetch(self.root_page)?;
            let root = Node::open(handle.read())?;
            root.is_full()
        };

        if root_full {
            let new_root = self.pager.allocate()?;
            let new_root_id = new_root.page_id();
            {
                let mut node = Node::init_internal(new_root.write());
                node.set_child(0, self.root_page)?;
            }
            self.split_child(new_root_id, 0)?;
            trace!(old_root = %self.root_page, new_root = %new_root_id, "root split");
            self.root_page = new_root_id;
        }

        self.insert_non_full(self.root_page, key, record)
    }

    /// Descend from a node known to have room, splitting full children first
    fn insert_non_full(&self, page_id: PageId, key: i32, record: RecordId) -> Result<()> {
        let mut current = page_id;
        loop {
            let handle = self.pager.fetch(current)?;
            let (is_leaf, mut index) = {
                let node = Node::open(handle.read())?;
                if node.is_leaf() {
                    (true, node.insertion_point(key))
                } else {
                    (false, node.child_index(key))
                }
            };

            if is_leaf {
                let mut leaf = Node::open(handle.write())?;
                if index < leaf.key_count() && leaf.key(index) == key {
                    return Err(StorageError::DuplicateKey(key));
                }
                return leaf.insert_entry(index, key, record);
            }

            let child_id = Node::open(handle.read())?.child(index)?;
            let child_full = {
                let child = self.pager.fetch(child_id)?;
                let node = Node::open(child.read())?;
                node.is_full()
            };

            if child_full {
                let promoted = self.split_child(current, index)?;
                if key >= promoted {
                    index += 1;
                }
            }

            current = Node::open(handle.read())?.child(index)?;
        }
    }

    /// Split the full child at `index` of `parent_id`, returning the key
    /// that now separates the two halves in the parent.
    ///
    /// Leaves copy their separator up and keep it as the right half's first
    /// key. Internal nodes move the middle key up.
    fn split_child(&self, parent_id: PageId, index: usize) -> Result<i32> {
        let parent = self.pager.fetch(parent_id)?;
        let child_id = Node::open(parent.read())?.child(index)?;
        let child_handle = self.pager.fetch(child_id)?;
        let right_handle = self.pager.allocate()?;
        let right_id = right_handle.page_id();

        let promoted = {
            let mut child = Node::open(child_handle.write())?;
            let count = child.key_count();

            if child.is_leaf() {
                let mut right = Node::init_leaf(right_handle.write());
                for (j, src) in (MIN_DEGREE - 1..count).enumerate() {
                    right.set_key(j, child.key(src));
                    right.set_data_pointer(j, child.data_pointer(src)?)?;
                }
                right.set_key_count(count - (MIN_DEGREE - 1));
                right.set_next_sibling(child.next_sibling()?)?;
                child.set_next_sibling(right_id)?;
                child.set_key_count(MIN_DEGREE - 1);
                right.key(0)
            } else {
                let mut right = Node::init_internal(right_handle.write());
                let middle = child.key(MIN_DEGREE - 1);
                for (j, src) in (MIN_DEGREE..count).enumerate() {
                    right.set_key(j, child.key(src));
                }
                for (j, src) in (MIN_DEGREE..=count).enumerate() {
                    right.set_child(j, child.child(src)?)?;
                }
                right.set_key_count(count - MIN_DEGREE);
                child.set_key_count(MIN_DEGREE - 1);
                middle
            }
        };

        Node::open(parent.write())?.insert_separator(index, promoted, right_id)?;
        trace!(left = %child_id, right = %right_id, separator = promoted, "split node");
        Ok(promoted)
    }

    /// Remove `key` from the tree, returning the record address it held.
    ///
    /// Restructuring happens on the way down, so callers should confirm the
    /// key exists first if they want a miss to leave the tree untouched.
    pub fn delete(&mut self, key: i32) -> Result<Option<RecordId>> {
        let removed = self.delete_from(self.root_page, key)?;

        let collapsed_to = {
            let handle = self.pager.fetch(self.root_page)?;
            let root = Node::open(handle.read())?;
            if !root.is_leaf() && root.key_count() == 0 {
                Some(root.child(0)?)
            } else {
                None
            }
        };
        if let Some(child) = collapsed_to {
            trace!(old_root = %self.root_page, new_root = %child, "root collapsed");
            self.root_page = child;
        }

        Ok(removed)
    }

    fn delete_from(&self, page_id: PageId, key: i32) -> Result<Option<RecordId>> {
        let mut current = page_id;
        loop {
            let handle = self.pager.fetch(current)?;
            let (is_leaf, mut index) = {
                let node = Node::open(handle.read())?;
                if node.is_leaf() {
                    (true, 0)
                } else {
                    (false, node.child_index(key))
                }
            };

            if is_leaf {
                let mut leaf = Node::open(handle.write())?;
                return match leaf.search(key) {
                    Some(at) => Ok(Some(leaf.remove_entry(at)?.1)),
                    None => Ok(None),
                };
            }

            let child_id = Node::open(handle.read())?.child(index)?;
            let child_keys = {
                let child = self.pager.fetch(child_id)?;
                let node = Node::open(child.read())?;
                node.key_count()
            };
            if child_keys <= MIN_KEYS {
                index = self.fill_child(current, index)?;
            }

            current = Node::open(handle.read())?.child(index)?;
        }
    }

    /// Bring the minimal child at `index` up to at least `t` keys.
    ///
    /// Returns the index of the child to descend into, which moves left when
    /// the child is merged into its left sibling.
    fn fill_child(&self, parent_id: PageId, index: usize) -> Result<usize> {
        let (left, right) = {
            let parent = self.pager.fetch(parent_id)?;
            let node = Node::open(parent.read())?;
            let left = if index > 0 {
                Some(node.child(index - 1)?)
            } else {
                None
            };
            let right = if index < node.key_count() {
                Some(node.child(index + 1)?)
            } else {
                None
            };
            (left, right)
        };

        if let Some(left_id) = left {
            if self.key_count(left_id)? > MIN_KEYS {
                self.borrow_from_left(parent_id, index)?;
                return Ok(index);
            }
        }
        if let Some(right_id) = right {
            if self.key_count(right_id)? > MIN_KEYS {
                self.borrow_from_right(parent_id, index)?;
                return Ok(index);
            }
        }

        match (left, right) {
            (_, Some(_)) => {
                self.merge_children(parent_id, index)?;
                Ok(index)
            }
            (Some(_), None) => {
                self.merge_children(parent_id, index - 1)?;
                Ok(index - 1)
            }
            (None, None) => Err(StorageError::corruption(format!(
                "internal node {} has a single child",
                parent_id
            ))),
        }
    }

    fn key_count(&self, page_id: PageId) -> Result<usize> {
        let handle = self.pager.fetch(page_id)?;
        let node = Node::open(handle.read())?;
        Ok(node.key_count())
    }

    /// Move one entry from the left sibling into child `index`
    fn borrow_from_left(&self, parent_id: PageId, index: usize) -> Result<()> {
        let parent = self.pager.fetch(parent_id)?;
        let (left_id, child_id, separator) = {
            let node = Node::open(parent.read())?;
            (node.child(index - 1)?, node.child(index)?, node.key(index - 1))
        };

        let new_separator = {
            let left_handle = self.pager.fetch(left_id)?;
            let child_handle = self.pager.fetch(child_id)?;
            let mut left = Node::open(left_handle.write())?;
            let mut child = Node::open(child_handle.write())?;
            let last = left.key_count() - 1;

            if child.is_leaf() {
                let (key, record) = left.remove_entry(last)?;
                child.insert_entry(0, key, record)?;
                key
            } else {
                let moved_child = left.child(last + 1)?;
                let moved_key = left.key(last);
                left.set_key_count(last);
                child.push_front(separator, moved_child)?;
                moved_key
            }
        };

        Node::open(parent.write())?.set_key(index - 1, new_separator);
        trace!(from = %left_id, to = %child_id, "borrowed from left sibling");
        Ok(())
    }

    /// Move one entry from the right sibling into child `index`
    fn borrow_from_right(&self, parent_id: PageId, index: usize) -> Result<()> {
        let parent = self.pager.fetch(parent_id)?;
        let (child_id, right_id, separator) = {
            let node = Node::open(parent.read())?;
            (node.child(index)?, node.child(index + 1)?, node.key(index))
        };

        let new_separator = {
            let child_handle = self.pager.fetch(child_id)?;
            let right_handle = self.pager.fetch(right_id)?;
            let mut child = Node::open(child_handle.write())?;
            let mut right = Node::open(right_handle.write())?;

            if child.is_leaf() {
                let (key, record) = right.remove_entry(0)?;
                let end = child.key_count();
                child.insert_entry(end, key, record)?;
                right.key(0)
            } else {
                let (first_key, first_child) = right.pop_front()?;
                child.push_back(separator, first_child)?;
                first_key
            }
        };

        Node::open(parent.write())?.set_key(index, new_separator);
        trace!(from = %right_id, to = %child_id, "borrowed from right sibling");
        Ok(())
    }

    /// Merge child `index + 1` into child `index` and drop their separator
    fn merge_children(&self, parent_id: PageId, index: usize) -> Result<()> {
        let parent = self.pager.fetch(parent_id)?;
        let (left_id, right_id, separator) = {
            let node = Node::open(parent.read())?;
            (node.child(index)?, node.child(index + 1)?, node.key(index))
        };

        {
            let left_handle = self.pager.fetch(left_id)?;
            let right_handle = self.pager.fetch(right_id)?;
            let mut left = Node::open(left_handle.write())?;
            let mut right = Node::open(right_handle.write())?;
            let left_count = left.key_count();
            let right_count = right.key_count();

            if left.is_leaf() {
                if left_count + right_count > MAX_KEYS {
                    return Err(StorageError::corruption("merged leaf would overflow"));
                }
                for j in 0..right_count {
                    left.set_key(left_count + j, right.key(j));
                    left.set_data_pointer(left_count + j, right.data_pointer(j)?)?;
                }
                left.set_key_count(left_count + right_count);
                left.set_next_sibling(right.next_sibling()?)?;
            } else {
                if left_count + right_count + 1 > MAX_KEYS {
                    return Err(StorageError::corruption("merged node would overflow"));
                }
                left.set_key(left_count, separator);
                for j in 0..right_count {
                    left.set_key(left_count + 1 + j, right.key(j));
                }
                for j in 0..=right_count {
                    left.set_child(left_count + 1 + j, right.child(j)?)?;
                }
                left.set_key_count(left_count + 1 + right_count);
            }
            right.set_key_count(0);
        }

        Node::open(parent.write())?.remove_separator(index)?;
        trace!(into = %left_id, from = %right_id, "merged siblings");
        Ok(())
    }

    /// Snapshot the whole tree for display
    pub fn export(&self) -> Result<TreeNode> {
        self.export_node(self.root_page)
    }

    fn export_node(&self, page_id: PageId) -> Result<TreeNode> {
        let (is_leaf, keys, children) = {
            let handle = self.pager.fetch(page_id)?;
            let node = Node::open(handle.read())?;
            let children = if node.is_leaf() {
                Vec::new()
            } else {
                node.children()?
            };
            (node.is_leaf(), node.keys(), children)
        };

        let children = children
            .into_iter()
            .map(|child| self.export_node(child))
            .collect::<Result<Vec<_>>>()?;

        Ok(TreeNode {
            page_id: page_id.value(),
            is_leaf,
            keys,
            children,
        })
    }

    /// Walk the tree and check its structural invariants: sorted keys,
    /// occupancy bounds, key ranges, uniform leaf depth and a leaf chain
    /// that visits every key in order.
    pub fn validate(&self) -> Result<()> {
        let mut leaf_depth = None;
        let mut leaves = Vec::new();
        self.validate_node(self.root_page, true, None, None, 1, &mut leaf_depth, &mut leaves)?;

        let mut chained = Vec::new();
        let mut current = self.first_leaf()?;
        while !current.is_null() {
            chained.push(current);
            let handle = self.pager.fetch(current)?;
            current = Node::open(handle.read())?.next_sibling()?;
        }
        if chained != leaves {
            return Err(StorageError::corruption(format!(
                "leaf chain {:?} does not match tree order {:?}",
                chained, leaves
            )));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_node(
        &self,
        page_id: PageId,
        is_root: bool,
        lower: Option<i32>,
        upper: Option<i32>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<PageId>,
    ) -> Result<()> {
        let handle = self.pager.fetch(page_id)?;
        let node = Node::open(handle.read())?;
        let keys = node.keys();

        if !is_root && keys.len() < MIN_KEYS {
            return Err(StorageError::corruption(format!(
                "node {} holds {} keys",
                page_id,
                keys.len()
            )));
        }
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(StorageError::corruption(format!(
                "node {} keys out of order: {:?}",
                page_id, keys
            )));
        }
        let in_range = |k: &i32| lower.map_or(true, |lo| *k >= lo) && upper.map_or(true, |hi| *k < hi);
        if !keys.iter().all(in_range) {
            return Err(StorageError::corruption(format!(
                "node {} keys {:?} escape range {:?}..{:?}",
                page_id, keys, lower, upper
            )));
        }

        if node.is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(StorageError::corruption(format!(
                        "leaf {} at depth {}, expected {}",
                        page_id, depth, expected
                    )))
                }
                Some(_) => {}
            }
            leaves.push(page_id);
            return Ok(());
        }

        if keys.is_empty() {
            return Err(StorageError::corruption(format!(
                "internal node {} has no keys",
                page_id
            )));
        }

        let children = node.children()?;
        drop(node);
        drop(handle);
        for (i, child) in children.into_iter().enumerate() {
            let lo = if i == 0 { lower } else { Some(keys[i - 1]) };
            let hi = if i == keys.len() { upper } else { Some(keys[i]) };
            self.validate_node(child, false, lo, hi, depth + 1, leaf_depth, leaves)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskManagerImpl;
    use crate::types::PAGE_SIZE;
    use tempfile::{tempdir, TempDir};

    fn create_test_tree() -> Result<(BTree, TempDir)> {
        let dir = tempdir().unwrap();
        let dm = Arc::new(DiskManagerImpl::open(
            &dir.path().join("tree.db"),
            PAGE_SIZE,
            false,
        )?);
        let pager = Arc::new(Pager::new(dm)?);
        Ok((BTree::create(pager)?, dir))
    }

    fn rid(key: i32) -> RecordId {
        RecordId::new(PageId::new(1000), key as u32)
    }

    fn collect_keys(tree: &BTree) -> Result<Vec<i32>> {
        let mut keys = Vec::new();
        let mut current = tree.first_leaf()?;
        while !current.is_null() {
            let handle = tree.pager.fetch(current)?;
            let node = Node::open(handle.read())?;
            keys.extend(node.keys());
            current = node.next_sibling()?;
        }
        Ok(keys)
    }

    #[test]
    fn test_empty_tree() -> Result<()> {
        let (tree, _dir) = create_test_tree()?;
        assert_eq!(tree.search(1)?, None);
        assert_eq!(tree.height()?, 1);
        tree.validate()
    }

    #[test]
    fn test_first_root_split() -> Result<()> {
        let (mut tree, _dir) = create_test_tree()?;
        let old_root = tree.root_page();
        for key in [10, 20, 30, 40, 50, 60] {
            tree.insert(key, rid(key))?;
        }

        assert_ne!(tree.root_page(), old_root);
        let root = tree.export()?;
        assert!(!root.is_leaf);
        assert_eq!(root.keys, vec![30]);
        assert_eq!(root.children[0].keys, vec![10, 20]);
        assert_eq!(root.children[1].keys, vec![30, 40, 50, 60]);
        // left half of the split keeps the old root page
        assert_eq!(root.children[0].page_id, old_root.value());
        tree.validate()
    }

    #[test]
    fn test_separator_key_routes_right() -> Result<()> {
        let (mut tree, _dir) = create_test_tree()?;
        for key in 1..=6 {
            tree.insert(key, rid(key))?;
        }
        // separator 3 was copied into the right leaf
        assert_eq!(tree.search(3)?, Some(rid(3)));
        assert_eq!(tree.search(2)?, Some(rid(2)));
        Ok(())
    }

    #[test]
    fn test_duplicate_rejected() -> Result<()> {
        let (mut tree, _dir) = create_test_tree()?;
        tree.insert(7, rid(7))?;
        assert!(matches!(
            tree.insert(7, rid(8)),
            Err(StorageError::DuplicateKey(7))
        ));
        assert_eq!(tree.search(7)?, Some(rid(7)));
        Ok(())
    }

    #[test]
    fn test_many_inserts_grow_tree() -> Result<()> {
        let (mut tree, _dir) = create_test_tree()?;
        for key in (0..500).rev() {
            tree.insert(key, rid(key))?;
        }

        assert!(tree.height()? >= 3);
        tree.validate()?;
        assert_eq!(collect_keys(&tree)?, (0..500).collect::<Vec<_>>());
        for key in 0..500 {
            assert_eq!(tree.search(key)?, Some(rid(key)));
        }
        Ok(())
    }

    #[test]
    fn test_delete_borrows_and_merges() -> Result<()> {
        let (mut tree, _dir) = create_test_tree()?;
        for key in 0..200 {
            tree.insert(key, rid(key))?;
        }

        for key in (0..200).step_by(3) {
            assert_eq!(tree.delete(key)?, Some(rid(key)));
            tree.validate()?;
        }

        let expected: Vec<i32> = (0..200).filter(|k| k % 3 != 0).collect();
        assert_eq!(collect_keys(&tree)?, expected);
        assert_eq!(tree.search(3)?, None);
        Ok(())
    }

    #[test]
    fn test_delete_everything_collapses_root() -> Result<()> {
        let (mut tree, _dir) = create_test_tree()?;
        for key in 0..100 {
            tree.insert(key, rid(key))?;
        }
        for key in 0..100 {
            assert!(tree.delete(key)?.is_some());
        }

        assert_eq!(tree.height()?, 1);
        assert!(collect_keys(&tree)?.is_empty());
        tree.validate()?;

        // the tree is still usable afterwards
        tree.insert(42, rid(42))?;
        assert_eq!(tree.search(42)?, Some(rid(42)));
        Ok(())
    }

    #[test]
    fn test_delete_from_root_leaf() -> Result<()> {
        let (mut tree, _dir) = create_test_tree()?;
        tree.insert(1, rid(1))?;
        tree.insert(2, rid(2))?;

        assert_eq!(tree.delete(1)?, Some(rid(1)));
        assert_eq!(tree.delete(1)?, None);
        assert_eq!(collect_keys(&tree)?, vec![2]);
        Ok(())
    }
}
