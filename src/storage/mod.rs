//! Storage layer: disk I/O and the database file header.
//!
//! This module provides the page-granular file abstraction and the
//! format of page 0.

mod disk_manager;
mod file_header;

pub use disk_manager::{DiskManager, DiskManagerImpl};
pub use file_header::{FileHeader, TableRoots, MAGIC};
