//! Common types used throughout the storage engine.

mod page_id;
mod record_id;

pub use page_id::PageId;
pub use record_id::RecordId;

/// Default page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Smallest accepted page size
pub const MIN_PAGE_SIZE: usize = 512;

/// Largest accepted page size; the free-space pointer is a u16
pub const MAX_PAGE_SIZE: usize = 32768;

/// Minimum degree `t` of the B+Tree
pub const MIN_DEGREE: usize = 3;

/// Maximum keys per node (`2t - 1`)
pub const MAX_KEYS: usize = 2 * MIN_DEGREE - 1;

/// Minimum keys per non-root node (`t - 1`)
pub const MIN_KEYS: usize = MIN_DEGREE - 1;

/// Page types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Interior node of a table B+Tree (keys + child pointers)
    BTreeInternal = 0x05,
    /// Leaf node of a table B+Tree (keys + data pointers)
    BTreeLeaf = 0x0A,
    /// Record storage page in a table's data chain
    DataPage = 0x0D,
}

impl PageType {
    /// Check if this is a leaf page type
    pub fn is_leaf(self) -> bool {
        self == Self::BTreeLeaf
    }

    /// Check if this is an internal page type
    pub fn is_internal(self) -> bool {
        self == Self::BTreeInternal
    }

    /// Convert from byte value
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x05 => Some(Self::BTreeInternal),
            0x0A => Some(Self::BTreeLeaf),
            0x0D => Some(Self::DataPage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_type_conversions() {
        assert!(PageType::BTreeLeaf.is_leaf());
        assert!(!PageType::BTreeInternal.is_leaf());
        assert!(PageType::BTreeInternal.is_internal());
        assert!(!PageType::DataPage.is_internal());

        assert_eq!(PageType::from_byte(0x0D), Some(PageType::DataPage));
        assert_eq!(PageType::from_byte(0x00), None);
        assert_eq!(PageType::from_byte(0xFF), None);
    }

    #[test]
    fn test_degree_bounds() {
        assert_eq!(MAX_KEYS, 5);
        assert_eq!(MIN_KEYS, 2);
    }
}
