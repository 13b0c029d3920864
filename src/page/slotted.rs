//! Slotted data page.
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │              Page Header (13 bytes)                 │
//! ├────────────────────────────────────────────────────┤
//! │   Slot Directory  [slot0][slot1][slot2]...  →      │
//! ├────────────────────────────────────────────────────┤
//! │                   Free Space                        │
//! ├────────────────────────────────────────────────────┤
//! │      ←  [rec2][rec1][rec0]          Record Area    │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! Slots are kept in insertion order, not key order. Deleting a record
//! zeroes its slot length; the bytes are never compacted.

use std::ops::{Deref, DerefMut};

use crate::error::{Result, StorageError};
use crate::page::header::{
    PageHeader, FREE_SPACE_POINTER_OFFSET, HEADER_SIZE, NEXT_DATA_PAGE_OFFSET, ROW_COUNT_OFFSET,
    SLOT_SIZE,
};
use crate::page::Page;
use crate::types::{PageId, PageType};

/// Record-level view over a data page
pub struct SlottedPage<P> {
    page: P,
}

impl<P: Deref<Target = Page>> SlottedPage<P> {
    /// View an existing data page
    pub fn open(page: P) -> Result<Self> {
        match page.page_type() {
            Some(PageType::DataPage) => Ok(Self { page }),
            other => Err(StorageError::invalid_page(format!(
                "page {} is not a data page ({:?})",
                page.page_id(),
                other
            ))),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    /// Number of slots, tombstones included
    pub fn row_count(&self) -> usize {
        self.page.read_u16(ROW_COUNT_OFFSET) as usize
    }

    fn free_space_pointer(&self) -> usize {
        self.page.read_u16(FREE_SPACE_POINTER_OFFSET) as usize
    }

    /// Bytes between the end of the slot directory and the record area
    pub fn free_space(&self) -> usize {
        let directory_end = HEADER_SIZE + self.row_count() * SLOT_SIZE;
        self.free_space_pointer().saturating_sub(directory_end)
    }

    /// Largest record an empty page of this size can hold
    pub fn max_record_size(page_size: usize) -> usize {
        page_size - HEADER_SIZE - SLOT_SIZE
    }

    pub fn next_data_page(&self) -> PageId {
        PageId::new(self.page.read_u32(NEXT_DATA_PAGE_OFFSET))
    }

    fn slot_entry(&self, slot: u32) -> Result<(usize, usize)> {
        if slot as usize >= self.row_count() {
            return Err(StorageError::RecordNotFound {
                page_id: self.page_id(),
                slot,
            });
        }
        let offset = HEADER_SIZE + slot as usize * SLOT_SIZE;
        Ok((
            self.page.read_u16(offset) as usize,
            self.page.read_u16(offset + 2) as usize,
        ))
    }

    /// Check whether a slot holds a live (non-tombstoned) record
    pub fn is_live(&self, slot: u32) -> bool {
        matches!(self.slot_entry(slot), Ok((_, len)) if len > 0)
    }

    /// Copy out the record stored in a slot
    pub fn get_record(&self, slot: u32) -> Result<Vec<u8>> {
        let (offset, len) = self.slot_entry(slot)?;
        if len == 0 {
            return Err(StorageError::RecordNotFound {
                page_id: self.page_id(),
                slot,
            });
        }
        if offset + len > self.page.size() {
            return Err(StorageError::corruption(format!(
                "slot {} of page {} points past the page end",
                slot,
                self.page_id()
            )));
        }
        Ok(self.page.read_bytes(offset, len).to_vec())
    }
}

impl<P: DerefMut<Target = Page>> SlottedPage<P> {
    /// Format a page as an empty data page
    pub fn initialize(mut page: P) -> Self {
        let size = page.size();
        PageHeader::new_data(size).write(&mut page);
        Self { page }
    }

    /// Append a record, returning its slot index
    pub fn add_record(&mut self, bytes: &[u8]) -> Result<u32> {
        if bytes.is_empty() {
            return Err(StorageError::invalid_page("cannot store an empty record"));
        }

        let needed = bytes.len() + SLOT_SIZE;
        let available = self.free_space();
        if available < needed {
            return Err(StorageError::InsufficientSpace {
                page_id: self.page_id(),
                needed,
                available,
            });
        }

        let row_count = self.row_count();
        let record_start = self.free_space_pointer() - bytes.len();
        self.page.write_bytes(record_start, bytes);

        let slot_offset = HEADER_SIZE + row_count * SLOT_SIZE;
        self.page.write_u16(slot_offset, record_start as u16);
        self.page.write_u16(slot_offset + 2, bytes.len() as u16);

        self.page.write_u16(ROW_COUNT_OFFSET, (row_count + 1) as u16);
        self.page
            .write_u16(FREE_SPACE_POINTER_OFFSET, record_start as u16);

        Ok(row_count as u32)
    }

    /// Tombstone a record by zeroing its slot length
    pub fn delete_record(&mut self, slot: u32) -> Result<()> {
        self.slot_entry(slot)?;
        let offset = HEADER_SIZE + slot as usize * SLOT_SIZE;
        self.page.write_u16(offset + 2, 0);
        Ok(())
    }

    /// Overwrite a live record with bytes of exactly the same length
    pub fn update_record(&mut self, slot: u32, bytes: &[u8]) -> Result<()> {
        let (offset, len) = self.slot_entry(slot)?;
        if len == 0 {
            return Err(StorageError::RecordNotFound {
                page_id: self.page_id(),
                slot,
            });
        }
        if len != bytes.len() {
            return Err(StorageError::invalid_page(format!(
                "in-place update must keep the record length ({} != {})",
                bytes.len(),
                len
            )));
        }
        self.page.write_bytes(offset, bytes);
        Ok(())
    }

    pub fn set_next_data_page(&mut self, page_id: PageId) {
        self.page.write_u32(NEXT_DATA_PAGE_OFFSET, page_id.value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PAGE_SIZE;

    fn data_page() -> Page {
        let mut page = Page::new(PageId::new(1), PAGE_SIZE);
        SlottedPage::initialize(&mut page);
        page
    }

    #[test]
    fn test_initialize() {
        let page = data_page();
        let slotted = SlottedPage::open(&page).unwrap();
        assert_eq!(slotted.row_count(), 0);
        assert_eq!(slotted.free_space(), PAGE_SIZE - HEADER_SIZE);
        assert!(slotted.next_data_page().is_null());
        assert!(page.is_dirty());
    }

    #[test]
    fn test_add_and_get() {
        let mut page = data_page();
        let mut slotted = SlottedPage::open(&mut page).unwrap();

        let a = slotted.add_record(b"first").unwrap();
        let b = slotted.add_record(b"second record").unwrap();
        assert_eq!((a, b), (0, 1));

        assert_eq!(slotted.get_record(0).unwrap(), b"first");
        assert_eq!(slotted.get_record(1).unwrap(), b"second record");
        assert_eq!(
            slotted.free_space(),
            PAGE_SIZE - HEADER_SIZE - 2 * SLOT_SIZE - 5 - 13
        );

        // records grow backward from the page end
        assert_eq!(page.read_u16(HEADER_SIZE), (PAGE_SIZE - 5) as u16);
    }

    #[test]
    fn test_delete_tombstones_slot() {
        let mut page = data_page();
        let mut slotted = SlottedPage::open(&mut page).unwrap();
        slotted.add_record(b"a").unwrap();
        slotted.add_record(b"b").unwrap();
        let before = slotted.free_space();

        slotted.delete_record(0).unwrap();
        assert!(!slotted.is_live(0));
        assert!(slotted.is_live(1));
        assert!(matches!(
            slotted.get_record(0),
            Err(StorageError::RecordNotFound { slot: 0, .. })
        ));
        // logical delete only, nothing reclaimed
        assert_eq!(slotted.free_space(), before);
        assert_eq!(slotted.row_count(), 2);
    }

    #[test]
    fn test_out_of_range_slot() {
        let page = data_page();
        let slotted = SlottedPage::open(&page).unwrap();
        assert!(matches!(
            slotted.get_record(3),
            Err(StorageError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_insufficient_space() {
        let mut page = data_page();
        let mut slotted = SlottedPage::open(&mut page).unwrap();

        let record = vec![7u8; 1000];
        let mut stored = 0;
        loop {
            match slotted.add_record(&record) {
                Ok(_) => stored += 1,
                Err(StorageError::InsufficientSpace { needed, available, .. }) => {
                    assert_eq!(needed, 1000 + SLOT_SIZE);
                    assert!(available < needed);
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(stored, 4);
        assert_eq!(slotted.row_count(), 4);
    }

    #[test]
    fn test_exact_fit_leaves_zero_free_space() {
        let mut page = data_page();
        let mut slotted = SlottedPage::open(&mut page).unwrap();
        let max = SlottedPage::<&Page>::max_record_size(PAGE_SIZE);

        slotted.add_record(&vec![1u8; max]).unwrap();
        assert_eq!(slotted.free_space(), 0);
        assert!(slotted.add_record(b"x").is_err());
    }

    #[test]
    fn test_update_in_place() {
        let mut page = data_page();
        let mut slotted = SlottedPage::open(&mut page).unwrap();
        let slot = slotted.add_record(b"abcd").unwrap();

        slotted.update_record(slot, b"wxyz").unwrap();
        assert_eq!(slotted.get_record(slot).unwrap(), b"wxyz");
        assert!(slotted.update_record(slot, b"longer").is_err());
    }

    #[test]
    fn test_open_rejects_node_pages() {
        let mut page = Page::new(PageId::new(4), PAGE_SIZE);
        page.set_page_type(PageType::BTreeLeaf);
        assert!(SlottedPage::open(&page).is_err());
    }
}
