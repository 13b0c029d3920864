//! Disk manager implementation.
//!
//! The disk manager reads and writes whole pages at `page_number * page_size`
//! in a single backing file. It knows nothing about page contents; caching
//! and dirty tracking live in the pager.

use crate::error::{Result, StorageError};
use crate::types::PageId;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Trait for disk I/O operations
///
/// This abstraction allows swapping the storage backend or mocking for tests.
pub trait DiskManager: Send + Sync {
    /// Page size in bytes
    fn page_size(&self) -> usize;

    /// Number of whole pages currently in the file
    fn page_count(&self) -> Result<u32>;

    /// Read a page from disk
    fn read_page(&self, page_id: PageId) -> Result<Vec<u8>>;

    /// Write a page to disk
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Sync all data to disk
    fn sync(&self) -> Result<()>;
}

/// File-based disk manager implementation
pub struct DiskManagerImpl {
    /// The database file
    file: Mutex<File>,
    page_size: usize,
    /// Whether to sync on each write
    sync_on_write: bool,
}

impl DiskManagerImpl {
    /// Open or create a database file
    pub fn open(path: &Path, page_size: usize, sync_on_write: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len % page_size as u64 != 0 {
            return Err(StorageError::invalid_db(format!(
                "file length {} is not a multiple of the page size {}",
                len, page_size
            )));
        }

        debug!(path = %path.display(), pages = len / page_size as u64, "opened database file");

        Ok(Self {
            file: Mutex::new(file),
            page_size,
            sync_on_write,
        })
    }
}

impl DiskManager for DiskManagerImpl {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> Result<u32> {
        let len = self.file.lock().metadata()?.len();
        Ok((len / self.page_size as u64) as u32)
    }

    fn read_page(&self, page_id: PageId) -> Result<Vec<u8>> {
        let offset = page_id.file_offset(self.page_size);
        let mut buf = vec![0u8; self.page_size];

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;

        Ok(buf)
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != self.page_size {
            return Err(StorageError::invalid_page(format!(
                "page data must be {} bytes, got {}",
                self.page_size,
                data.len()
            )));
        }

        let offset = page_id.file_offset(self.page_size);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        if self.sync_on_write {
            file.sync_data()?;
        }

        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}
