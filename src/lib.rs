//! # pagedb
//!
//! A single-file, page-organized storage engine: fixed-size pages, slotted
//! record pages and a B+Tree index per table, with a small catalog so many
//! named tables can share one file.
//!
//! ## Architecture
//!
//! - **Storage Layer** (`storage`): page-granular file I/O and the header page
//! - **Page Store** (`buffer`): cache of every page touched, with dirty tracking
//! - **Page Layer** (`page`): shared page header and the slotted record layout
//! - **B+Tree Layer** (`btree`): node view, split/merge algorithms, leaf cursor
//! - **Tables** (`table`, `record`): data-page chains and row encoding
//! - **Catalog** (`catalog`): table name → root pages and schema
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pagedb::{Config, DataType, Database, Row, Schema};
//!
//! let mut db = Database::open(Config::new("my_database.db"))?;
//!
//! let schema = Schema::new([("id", DataType::Integer), ("name", DataType::Text)])?;
//! let users = db.create_table("users", schema)?;
//! users.insert(1, &Row::new().with("id", 1).with("name", "alice"))?;
//!
//! let users = db.open_table("users")?;
//! for entry in users.start()? {
//!     let (key, row) = entry?;
//!     println!("{} -> {:?}", key, row);
//! }
//!
//! db.close()?;
//! ```

pub mod btree;
pub mod buffer;
pub mod catalog;
pub mod error;
pub mod format;
pub mod page;
pub mod record;
pub mod shell;
pub mod storage;
pub mod table;
pub mod types;

pub use error::{Result, StorageError};
pub use types::{PageId, RecordId, PAGE_SIZE};

// Re-export main public API
pub use btree::TreeNode;
pub use catalog::{table_key, Catalog};
pub use format::format_rows;
pub use record::{Column, DataType, Row, Schema, Value};
pub use table::{RowCursor, Table};

use buffer::Pager;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use storage::{DiskManagerImpl, FileHeader};
use tracing::debug;
use types::{MAX_PAGE_SIZE, MIN_PAGE_SIZE};

/// Database configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the database file
    pub path: PathBuf,
    /// Page size in bytes (default: 4096)
    pub page_size: usize,
    /// Flush dirty pages at the end of every mutation (default: true)
    pub write_through: bool,
    /// Sync the file after every page write (default: false)
    pub sync_on_write: bool,
}

impl Config {
    /// Create a new configuration with default settings
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            page_size: PAGE_SIZE,
            write_through: true,
            sync_on_write: false,
        }
    }

    /// Set the page size; must be a power of two in 512..=32768
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Flush after each insert, delete and update
    pub fn write_through(mut self, enabled: bool) -> Self {
        self.write_through = enabled;
        self
    }

    /// Enable sync on write for durability
    pub fn sync_on_write(mut self, enabled: bool) -> Self {
        self.sync_on_write = enabled;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two()
            || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size)
        {
            return Err(StorageError::InvalidConfig(format!(
                "page size {} must be a power of two between {} and {}",
                self.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    /// Total number of pages in the file
    pub page_count: u32,
    /// Pages resident in the page cache
    pub cached_pages: usize,
    /// Page size in bytes
    pub page_size: usize,
    /// Tables currently open
    pub open_tables: usize,
}

/// Main database handle
///
/// Owns the page store, the catalog and every table opened through it.
/// Table roots move as trees split and shrink; [`Database::close`] writes
/// the current roots back to the catalog.
pub struct Database {
    config: Config,
    pager: Arc<Pager>,
    catalog: Catalog,
    /// Open tables by catalog key, so colliding names share one handle
    tables: HashMap<i32, Table>,
}

impl Database {
    /// Open or create a database at the configured path
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let disk_manager = Arc::new(DiskManagerImpl::open(
            &config.path,
            config.page_size,
            config.sync_on_write,
        )?);
        let pager = Arc::new(Pager::new(disk_manager)?);

        let catalog = if pager.page_count() == 0 {
            Self::bootstrap(&pager, &config)?
        } else {
            Self::load(&pager, &config)?
        };

        let db = Self {
            config,
            pager,
            catalog,
            tables: HashMap::new(),
        };
        debug!(path = %db.config.path.display(), pages = db.pager.page_count(), "opened database");
        Ok(db)
    }

    /// Lay out the header page and the two system tables in an empty file
    fn bootstrap(pager: &Arc<Pager>, config: &Config) -> Result<Catalog> {
        let header_page = pager.allocate()?;
        if header_page.page_id() != PageId::HEADER {
            return Err(StorageError::invalid_db("header page must be page 0"));
        }

        let catalog = Catalog::bootstrap(Arc::clone(pager), config.write_through)?;
        let (tables, columns) = catalog.roots();
        FileHeader {
            page_size: config.page_size as u32,
            tables,
            columns,
        }
        .write(&mut header_page.write());

        pager.flush_dirty()?;
        Ok(catalog)
    }

    fn load(pager: &Arc<Pager>, config: &Config) -> Result<Catalog> {
        let header = {
            let handle = pager.fetch(PageId::HEADER)?;
            let page = handle.read();
            FileHeader::read(&page)?
        };
        if header.page_size as usize != config.page_size {
            return Err(StorageError::invalid_db(format!(
                "file uses {}-byte pages, configured for {}",
                header.page_size, config.page_size
            )));
        }

        Ok(Catalog::open(
            Arc::clone(pager),
            header.tables,
            header.columns,
            config.write_through,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a table and keep it open
    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<&mut Table> {
        let table = self.catalog.create_table(name, schema)?;
        let key = table_key(name);
        self.tables.insert(key, table);
        if self.config.write_through {
            // creating a table can split the catalog's own trees
            self.write_header()?;
            self.pager.flush_dirty()?;
        }
        self.tables
            .get_mut(&key)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    /// Open a table by name, reusing the instance if it is already open
    pub fn open_table(&mut self, name: &str) -> Result<&mut Table> {
        let key = table_key(name);
        if !self.tables.contains_key(&key) {
            let table = self.catalog.open_table(name)?;
            self.tables.insert(key, table);
        }
        self.tables
            .get_mut(&key)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    /// An already-open table, without touching the catalog
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&table_key(name))
    }

    /// Every table name in the catalog
    pub fn tables(&self) -> Result<Vec<String>> {
        self.catalog.list_tables()
    }

    /// Get statistics about the database
    pub fn stats(&self) -> DbStats {
        DbStats {
            page_count: self.pager.page_count(),
            cached_pages: self.pager.cached_pages(),
            page_size: self.pager.page_size(),
            open_tables: self.tables.len(),
        }
    }

    /// Export a table's tree structure for visualization
    pub fn export_tree(&mut self, name: &str) -> Result<TreeNode> {
        self.open_table(name)?.export_tree()
    }

    /// Persist every open table's roots and the header, then flush
    pub fn flush(&mut self) -> Result<()> {
        self.catalog.close_all(self.tables.values())?;
        self.write_header()?;
        self.pager.flush_dirty()?;
        Ok(())
    }

    /// Flush everything and release the file
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.pager.shutdown()?;
        debug!(path = %self.config.path.display(), "closed database");
        Ok(())
    }

    fn write_header(&self) -> Result<()> {
        let (tables, columns) = self.catalog.roots();
        let header = FileHeader {
            page_size: self.pager.page_size() as u32,
            tables,
            columns,
        };
        let handle = self.pager.fetch(PageId::HEADER)?;
        header.write(&mut handle.write());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn users() -> Schema {
        Schema::new([("id", DataType::Integer), ("name", DataType::Text)]).unwrap()
    }

    #[test]
    fn test_bootstrap_layout() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(Config::new(&path))?;

        // header plus two pages per system table
        assert_eq!(db.stats().page_count, 5);
        db.close()?;
        assert_eq!(std::fs::metadata(&path)?.len(), 5 * PAGE_SIZE as u64);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_page_size() {
        let dir = tempdir().unwrap();
        for size in [100, 1000, 256, 65536] {
            let config = Config::new(dir.path().join("x.db")).page_size(size);
            assert!(matches!(
                Database::open(config),
                Err(StorageError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_page_size_mismatch_on_reopen() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        Database::open(Config::new(&path).page_size(4096))?.close()?;

        assert!(matches!(
            Database::open(Config::new(&path).page_size(1024)),
            Err(StorageError::InvalidDatabaseFile(_))
        ));
        Ok(())
    }

    #[test]
    fn test_open_table_is_cached() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut db = Database::open(Config::new(dir.path().join("test.db")))?;
        db.create_table("users", users())?;
        db.open_table("users")?
            .insert(1, &Row::new().with("id", 1).with("name", "a"))?;

        assert_eq!(db.stats().open_tables, 1);
        assert!(db.table("users").is_some());
        assert!(db.table("other").is_none());
        assert_eq!(db.tables()?, vec!["users".to_string()]);
        Ok(())
    }

    #[test]
    fn test_colliding_names_share_one_handle() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let row = |id: i32| Row::new().with("id", id).with("name", "n");

        {
            let mut db = Database::open(Config::new(&path))?;
            db.create_table("plumless", users())?;
            assert!(matches!(
                db.create_table("buckeroo", users()),
                Err(StorageError::TableExists(_))
            ));

            for id in 0..10 {
                db.open_table("plumless")?.insert(id, &row(id))?;
                db.open_table("buckeroo")?.insert(100 + id, &row(100 + id))?;
            }
            assert_eq!(db.stats().open_tables, 1);
            assert_eq!(db.open_table("buckeroo")?.name(), "plumless");
            db.open_table("plumless")?.validate()?;
            db.close()?;
        }

        let mut db = Database::open(Config::new(&path))?;
        let table = db.open_table("plumless")?;
        table.validate()?;
        let keys: Vec<i32> = table.scan(None, None)?.into_iter().map(|(k, _)| k).collect();
        let expected: Vec<i32> = (0..10).chain(100..110).collect();
        assert_eq!(keys, expected);
        Ok(())
    }

    #[test]
    fn test_export_tree_serializes() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut db = Database::open(Config::new(dir.path().join("test.db")))?;
        let table = db.create_table("t", users())?;
        for id in 1..=6 {
            table.insert(id, &Row::new().with("id", id).with("name", "n"))?;
        }

        let tree = db.export_tree("t")?;
        let json = serde_json::to_value(&tree)?;
        assert_eq!(json["isLeaf"], false);
        assert_eq!(json["keys"], serde_json::json!([3]));
        assert_eq!(json["children"].as_array().map(Vec::len), Some(2));
        Ok(())
    }
}
