//! Page numbers and on-disk page pointers.

use std::fmt;

/// Zero-based number of a page in the database file.
///
/// Page `n` lives at byte offset `n * page_size`. Page 0 holds the file
/// header, so no table pointer ever refers to it. Every page pointer stored
/// on disk (child pointers, leaf sibling links, data-chain links and the
/// catalog roots) is a big-endian u32 where `NULL` (all bits set, -1 when
/// read as i32) marks the end of a chain or a missing child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PageId(pub u32);

impl PageId {
    /// Pointer value meaning "no page"
    pub const NULL: PageId = PageId(u32::MAX);

    /// The file header
    pub const HEADER: PageId = PageId(0);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    /// `None` for the `NULL` pointer, for following sibling and data chains
    pub const fn non_null(self) -> Option<PageId> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }

    /// Byte offset of this page in a file of `page_size` pages
    pub const fn file_offset(self, page_size: usize) -> u64 {
        self.0 as u64 * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.non_null() {
            Some(id) => write!(f, "{}", id.0),
            None => write!(f, "NULL"),
        }
    }
}
