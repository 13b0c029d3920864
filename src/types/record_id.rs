//! Physical record address (data pointer).

use super::PageId;
use std::fmt;

/// Location of a record: a data page and a slot within it.
///
/// Stored in leaf nodes as a single u64 packing `page << 32 | slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u32,
}

impl RecordId {
    pub const fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }

    /// Pack into the on-disk data pointer representation
    pub const fn to_u64(self) -> u64 {
        ((self.page_id.value() as u64) << 32) | self.slot as u64
    }

    /// Unpack an on-disk data pointer
    pub const fn from_u64(raw: u64) -> Self {
        Self {
            page_id: PageId::new((raw >> 32) as u32),
            slot: raw as u32,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_layout() {
        let rid = RecordId::new(PageId::new(7), 3);
        assert_eq!(rid.to_u64(), (7u64 << 32) | 3);
        assert_eq!(RecordId::from_u64(rid.to_u64()), rid);
    }

    #[test]
    fn test_high_slot_bits_do_not_leak() {
        let rid = RecordId::new(PageId::new(1), u32::MAX);
        let back = RecordId::from_u64(rid.to_u64());
        assert_eq!(back.page_id, PageId::new(1));
        assert_eq!(back.slot, u32::MAX);
    }
}
