//! Page layer: raw page buffers and the slotted record layout.
//!
//! Every page starts with the same 13-byte header:
//! - type tag, row/key count, free-space pointer
//! - next-sibling pointer (B+Tree leaves)
//! - next-data-page pointer (data-chain pages)
//!
//! Data pages follow the header with a slot directory growing forward
//! while record bytes grow backward from the end of the page.
//! B+Tree nodes reuse the header and place their key area after it
//! (see `btree::node`).

mod header;
mod slotted;

pub use header::{
    PageHeader, FREE_SPACE_POINTER_OFFSET, HEADER_SIZE, NEXT_DATA_PAGE_OFFSET,
    NEXT_SIBLING_OFFSET, PAGE_TYPE_OFFSET, ROW_COUNT_OFFSET, SLOT_SIZE,
};
pub use slotted::SlottedPage;

use crate::types::{PageId, PageType};

/// A cached page: its number, its bytes and a dirty flag.
///
/// Every mutating accessor marks the page dirty, so the page store
/// knows which pages must be written back.
#[derive(Clone)]
pub struct Page {
    page_id: PageId,
    data: Box<[u8]>,
    dirty: bool,
}

impl Page {
    /// Create a zero-filled page
    pub fn new(page_id: PageId, page_size: usize) -> Self {
        Self {
            page_id,
            data: vec![0u8; page_size].into_boxed_slice(),
            dirty: false,
        }
    }

    /// Wrap bytes read from disk
    pub fn from_bytes(page_id: PageId, bytes: Vec<u8>) -> Self {
        Self {
            page_id,
            data: bytes.into_boxed_slice(),
            dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Page size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get a reference to the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Decode the type tag, `None` for an uninitialized or foreign page
    pub fn page_type(&self) -> Option<PageType> {
        PageType::from_byte(self.data[PAGE_TYPE_OFFSET])
    }

    pub fn set_page_type(&mut self, page_type: PageType) {
        self.write_u8(PAGE_TYPE_OFFSET, page_type as u8);
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_be_bytes(buf)
    }

    pub fn read_i32(&self, offset: usize) -> i32 {
        self.read_u32(offset) as i32
    }

    pub fn read_u64(&self, offset: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[offset..offset + 8]);
        u64::from_be_bytes(buf)
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
        self.dirty = true;
    }

    pub fn write_u16(&mut self, offset: usize, value: u16) {
        self.write_bytes(offset, &value.to_be_bytes());
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.write_bytes(offset, &value.to_be_bytes());
    }

    pub fn write_i32(&mut self, offset: usize, value: i32) {
        self.write_bytes(offset, &value.to_be_bytes());
    }

    pub fn write_u64(&mut self, offset: usize, value: u64) {
        self.write_bytes(offset, &value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.dirty = true;
    }

    /// Overwrite the whole page with zeros
    pub fn reset(&mut self) {
        self.data.fill(0);
        self.dirty = true;
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("page_id", &self.page_id)
            .field("page_type", &self.page_type())
            .field("size", &self.size())
            .field("dirty", &self.dirty)
            .finish()
    }
}
