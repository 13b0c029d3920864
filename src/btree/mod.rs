//! B+Tree index over a table's keys.
//!
//! This module provides:
//! - `Node`: typed view of a page as a leaf or internal node
//! - `BTree`: search, insert with preemptive splits, delete with
//!   borrow/merge rebalancing
//! - `Cursor`: in-order iteration along the leaf chain

mod cursor;
mod node;
mod tree;

pub use cursor::Cursor;
pub use node::{Node, NodeKind};
pub use tree::{BTree, TreeNode};
