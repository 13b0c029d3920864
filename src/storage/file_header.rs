//! Database file header.
//!
//! The first page (page 0) of the database file identifies the format and
//! holds the root pointers of the two system tables.

use crate::error::{Result, StorageError};
use crate::page::Page;
use crate::types::PageId;

/// Magic bytes to identify a valid database file
pub const MAGIC: &[u8; 16] = b"PageDB format 1\0";

/// Bytes covered by the checksum
const CHECKSUM_OFFSET: usize = 36;

/// Root and data-chain head of one system table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRoots {
    pub root_page: PageId,
    pub first_data_page: PageId,
}

/// Database file header
///
/// Layout:
/// ```text
/// Offset  Size  Description
/// 0       16    Magic string "PageDB format 1\0"
/// 16      4     Page size
/// 20      4     Tables catalog root page
/// 24      4     Tables catalog first data page
/// 28      4     Columns catalog root page
/// 32      4     Columns catalog first data page
/// 36      4     Checksum of bytes 0..36 (CRC32)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Page size in bytes
    pub page_size: u32,
    /// Table-name → location catalog
    pub tables: TableRoots,
    /// Table-name → schema catalog
    pub columns: TableRoots,
}

impl FileHeader {
    /// Read a file header from the header page
    pub fn read(page: &Page) -> Result<Self> {
        let bytes = page.as_bytes();
        if bytes.len() < CHECKSUM_OFFSET + 4 {
            return Err(StorageError::invalid_db("header too short"));
        }

        if &bytes[0..16] != MAGIC {
            return Err(StorageError::invalid_db("invalid magic bytes"));
        }

        let stored_checksum = page.read_u32(CHECKSUM_OFFSET);
        let computed_checksum = crc32fast::hash(&bytes[0..CHECKSUM_OFFSET]);
        if stored_checksum != computed_checksum {
            return Err(StorageError::corruption("header checksum mismatch"));
        }

        Ok(Self {
            page_size: page.read_u32(16),
            tables: TableRoots {
                root_page: PageId::new(page.read_u32(20)),
                first_data_page: PageId::new(page.read_u32(24)),
            },
            columns: TableRoots {
                root_page: PageId::new(page.read_u32(28)),
                first_data_page: PageId::new(page.read_u32(32)),
            },
        })
    }

    /// Write this header to the header page
    pub fn write(&self, page: &mut Page) {
        page.reset();
        page.write_bytes(0, MAGIC);
        page.write_u32(16, self.page_size);
        page.write_u32(20, self.tables.root_page.value());
        page.write_u32(24, self.tables.first_data_page.value());
        page.write_u32(28, self.columns.root_page.value());
        page.write_u32(32, self.columns.first_data_page.value());

        let checksum = crc32fast::hash(&page.as_bytes()[0..CHECKSUM_OFFSET]);
        page.write_u32(CHECKSUM_OFFSET, checksum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PAGE_SIZE;

    fn sample() -> FileHeader {
        FileHeader {
            page_size: PAGE_SIZE as u32,
            tables: TableRoots {
                root_page: PageId::new(1),
                first_data_page: PageId::new(2),
            },
            columns: TableRoots {
                root_page: PageId::new(3),
                first_data_page: PageId::new(4),
            },
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let mut page = Page::new(PageId::HEADER, PAGE_SIZE);
        sample().write(&mut page);
        assert_eq!(FileHeader::read(&page).unwrap(), sample());
    }

    #[test]
    fn test_invalid_magic() {
        let mut page = Page::new(PageId::HEADER, PAGE_SIZE);
        page.write_bytes(0, b"InvalidMagic0000");
        assert!(matches!(
            FileHeader::read(&page),
            Err(StorageError::InvalidDatabaseFile(_))
        ));
    }

    #[test]
    fn test_checksum_validation() {
        let mut page = Page::new(PageId::HEADER, PAGE_SIZE);
        sample().write(&mut page);

        // Corrupt the tables root pointer
        let byte = page.read_u8(23);
        page.write_u8(23, byte ^ 0xFF);

        assert!(matches!(
            FileHeader::read(&page),
            Err(StorageError::Corruption(_))
        ));
    }
}
