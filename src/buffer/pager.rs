//! Page store implementation.
//!
//! The pager hands out cached pages by number. Pages stay resident for the
//! life of the store (no eviction) and are written back when flushed
//! explicitly or at shutdown if dirty.

use crate::error::{Result, StorageError};
use crate::page::Page;
use crate::storage::DiskManager;
use crate::types::PageId;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Page cache over a single database file
pub struct Pager {
    /// The disk manager for I/O
    disk_manager: Arc<dyn DiskManager>,
    /// Cached pages indexed by page ID
    frames: RwLock<HashMap<PageId, Arc<RwLock<Page>>>>,
    /// Number of allocated pages, on disk or not
    page_count: Mutex<u32>,
    page_size: usize,
}

impl Pager {
    /// Create a pager over the pages already present in the file
    pub fn new(disk_manager: Arc<dyn DiskManager>) -> Result<Self> {
        let page_count = disk_manager.page_count()?;
        let page_size = disk_manager.page_size();
        Ok(Self {
            disk_manager,
            frames: RwLock::new(HashMap::new()),
            page_count: Mutex::new(page_count),
            page_size,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Total number of allocated pages
    pub fn page_count(&self) -> u32 {
        *self.page_count.lock()
    }

    /// Number of pages resident in the cache
    pub fn cached_pages(&self) -> usize {
        self.frames.read().len()
    }

    /// Allocate a zero-filled page with the next sequential page number.
    ///
    /// The page is cached and marked dirty; it reaches the file on the next
    /// flush.
    pub fn allocate(&self) -> Result<PageHandle> {
        let page_id = {
            let mut count = self.page_count.lock();
            if *count == PageId::NULL.value() {
                return Err(StorageError::invalid_page("page number space exhausted"));
            }
            let id = PageId::new(*count);
            *count += 1;
            id
        };

        let mut page = Page::new(page_id, self.page_size);
        page.mark_dirty();
        let frame = Arc::new(RwLock::new(page));
        self.frames.write().insert(page_id, Arc::clone(&frame));

        debug!(page = %page_id, "allocated page");
        Ok(PageHandle { page_id, frame })
    }

    /// Fetch a page from the cache, reading it from disk on a miss
    pub fn fetch(&self, page_id: PageId) -> Result<PageHandle> {
        let page_count = self.page_count();
        if page_id.value() >= page_count {
            return Err(StorageError::OutOfRange {
                page_id,
                page_count,
            });
        }

        if let Some(frame) = self.frames.read().get(&page_id) {
            return Ok(PageHandle {
                page_id,
                frame: Arc::clone(frame),
            });
        }

        let bytes = self.disk_manager.read_page(page_id)?;
        trace!(page = %page_id, "loaded page from disk");

        let mut frames = self.frames.write();
        // Another caller may have loaded it between the two locks
        let frame = frames
            .entry(page_id)
            .or_insert_with(|| Arc::new(RwLock::new(Page::from_bytes(page_id, bytes))));

        Ok(PageHandle {
            page_id,
            frame: Arc::clone(frame),
        })
    }

    /// Write a page's full contents to its file offset, dirty or not
    pub fn flush(&self, page: &mut Page) -> Result<()> {
        self.disk_manager.write_page(page.page_id(), page.as_bytes())?;
        page.clear_dirty();
        Ok(())
    }

    /// Flush one cached page by number
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let handle = self.fetch(page_id)?;
        let mut page = handle.write();
        self.flush(&mut page)
    }

    /// Write back every dirty cached page, returning how many were written
    ///
    /// Callers must not hold a page guard while calling this.
    pub fn flush_dirty(&self) -> Result<usize> {
        let mut frames: Vec<(PageId, Arc<RwLock<Page>>)> = self
            .frames
            .read()
            .iter()
            .map(|(&id, frame)| (id, Arc::clone(frame)))
            .collect();
        frames.sort_by_key(|(id, _)| *id);

        let mut written = 0;
        for (_, frame) in frames {
            let mut page = frame.write();
            if page.is_dirty() {
                self.flush(&mut page)?;
                written += 1;
            }
        }

        if written > 0 {
            trace!(pages = written, "flushed dirty pages");
        }
        Ok(written)
    }

    /// Flush every dirty page and sync the file
    pub fn shutdown(&self) -> Result<()> {
        let written = self.flush_dirty()?;
        self.disk_manager.sync()?;
        debug!(pages = written, total = self.page_count(), "page store shut down");
        Ok(())
    }
}

/// Handle to a cached page
///
/// Guards returned by `read` and `write` must be released before the same
/// page is locked again; the tree code never holds two guards on one page.
pub struct PageHandle {
    page_id: PageId,
    frame: Arc<RwLock<Page>>,
}

impl PageHandle {
    /// Get the page ID
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Get a read lock on the page
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.frame.read()
    }

    /// Get a write lock on the page
    pub fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.frame.write()
    }
}
