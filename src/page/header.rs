//! Page header structure.
//!
//! The header occupies the first bytes of every data and B+Tree page.

use crate::error::{Result, StorageError};
use crate::page::Page;
use crate::types::{PageId, PageType};

/// Offset of the type tag
pub const PAGE_TYPE_OFFSET: usize = 0;

/// Offset of the row count (key count for B+Tree nodes)
pub const ROW_COUNT_OFFSET: usize = 1;

/// Offset of the free-space pointer
pub const FREE_SPACE_POINTER_OFFSET: usize = 3;

/// Offset of the next-sibling pointer (leaf nodes only)
pub const NEXT_SIBLING_OFFSET: usize = 5;

/// Offset of the next-data-page pointer (data-chain pages only)
pub const NEXT_DATA_PAGE_OFFSET: usize = 9;

/// Total header size; the slot directory or key area starts here
pub const HEADER_SIZE: usize = 13;

/// Size of one slot directory entry: (offset: u16, length: u16)
pub const SLOT_SIZE: usize = 4;

/// Decoded page header
///
/// Layout:
/// ```text
/// Offset  Size  Description
/// 0       1     Page type flag
/// 1       2     Number of rows (data page) or keys (B+Tree node)
/// 3       2     Free-space pointer: start of the used record area
/// 5       4     Next sibling leaf (NULL when absent)
/// 9       4     Next data page (NULL when absent)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub row_count: u16,
    pub free_space_pointer: u16,
    pub next_sibling: PageId,
    pub next_data_page: PageId,
}

impl PageHeader {
    /// Header of a freshly formatted data page
    pub fn new_data(page_size: usize) -> Self {
        Self {
            page_type: PageType::DataPage,
            row_count: 0,
            free_space_pointer: page_size as u16,
            next_sibling: PageId::NULL,
            next_data_page: PageId::NULL,
        }
    }

    /// Header of a freshly formatted B+Tree node
    pub fn new_node(page_type: PageType, page_size: usize) -> Self {
        Self {
            page_type,
            row_count: 0,
            free_space_pointer: page_size as u16,
            next_sibling: PageId::NULL,
            next_data_page: PageId::NULL,
        }
    }

    /// Read a header from a page
    pub fn read(page: &Page) -> Result<Self> {
        let page_type = page.page_type().ok_or_else(|| {
            StorageError::invalid_page(format!(
                "page {} has unknown type tag {:#04x}",
                page.page_id(),
                page.read_u8(PAGE_TYPE_OFFSET)
            ))
        })?;

        Ok(Self {
            page_type,
            row_count: page.read_u16(ROW_COUNT_OFFSET),
            free_space_pointer: page.read_u16(FREE_SPACE_POINTER_OFFSET),
            next_sibling: PageId::new(page.read_u32(NEXT_SIBLING_OFFSET)),
            next_data_page: PageId::new(page.read_u32(NEXT_DATA_PAGE_OFFSET)),
        })
    }

    /// Write this header to a page
    pub fn write(&self, page: &mut Page) {
        page.set_page_type(self.page_type);
        page.write_u16(ROW_COUNT_OFFSET, self.row_count);
        page.write_u16(FREE_SPACE_POINTER_OFFSET, self.free_space_pointer);
        page.write_u32(NEXT_SIBLING_OFFSET, self.next_sibling.value());
        page.write_u32(NEXT_DATA_PAGE_OFFSET, self.next_data_page.value());
    }
}
