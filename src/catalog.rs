//! Catalog of user tables.
//!
//! Two system tables, both keyed by `crc32(name)`:
//! - tables catalog: fixed-size [`CatalogRecord`] with the table's root and
//!   data-chain head, overwritten in place when a table is closed
//! - columns catalog: the table's schema as JSON
//!
//! Distinct names that hash to the same key are not told apart; a lookup
//! that lands on another table's record logs a warning and returns it.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::buffer::Pager;
use crate::error::{Result, StorageError};
use crate::record::Schema;
use crate::storage::TableRoots;
use crate::table::Table;
use crate::types::PageId;

/// Width of the NUL-padded name field
pub const TABLE_NAME_SIZE: usize = 32;

/// Catalog key for a table name
pub fn table_key(name: &str) -> i32 {
    crc32fast::hash(name.as_bytes()) as i32
}

/// Location of one user table
///
/// Layout (44 bytes):
/// ```text
/// Offset  Size  Description
/// 0       32    Table name, UTF-8, NUL padded
/// 32      4     Root page
/// 36      4     First data page
/// 40      4     Column count
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub name: String,
    pub root_page: PageId,
    pub first_data_page: PageId,
    pub column_count: u32,
}

impl CatalogRecord {
    pub const SIZE: usize = TABLE_NAME_SIZE + 12;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; Self::SIZE];
        let name = self.name.as_bytes();
        let len = name.len().min(TABLE_NAME_SIZE);
        bytes[..len].copy_from_slice(&name[..len]);
        bytes[32..36].copy_from_slice(&self.root_page.value().to_be_bytes());
        bytes[36..40].copy_from_slice(&self.first_data_page.value().to_be_bytes());
        bytes[40..44].copy_from_slice(&self.column_count.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(StorageError::corruption(format!(
                "catalog record is {} bytes, expected {}",
                bytes.len(),
                Self::SIZE
            )));
        }

        let name_len = bytes[..TABLE_NAME_SIZE]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(TABLE_NAME_SIZE);
        let name = std::str::from_utf8(&bytes[..name_len])
            .map_err(|_| StorageError::corruption("catalog name is not UTF-8"))?
            .to_string();
        let word = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        Ok(Self {
            name,
            root_page: PageId::new(word(32)),
            first_data_page: PageId::new(word(36)),
            column_count: word(40),
        })
    }
}

/// Reject names that cannot be stored in the catalog's name field
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidName("name is empty".to_string()));
    }
    if name.len() > TABLE_NAME_SIZE {
        return Err(StorageError::InvalidName(format!(
            "'{}' is longer than {} bytes",
            name, TABLE_NAME_SIZE
        )));
    }
    if name.as_bytes().contains(&0) {
        return Err(StorageError::InvalidName(format!("'{}' contains NUL", name.escape_default())));
    }
    Ok(())
}

/// Name-to-location directory for user tables
pub struct Catalog {
    pager: Arc<Pager>,
    tables: Table,
    columns: Table,
    write_through: bool,
}

impl Catalog {
    /// Create both system tables in a fresh file
    pub fn bootstrap(pager: Arc<Pager>, write_through: bool) -> Result<Self> {
        let tables = Table::create(Arc::clone(&pager), "tables", Schema::default(), write_through)?;
        let columns = Table::create(Arc::clone(&pager), "columns", Schema::default(), write_through)?;
        debug!(
            tables_root = %tables.root_page(),
            columns_root = %columns.root_page(),
            "bootstrapped catalog"
        );
        Ok(Self {
            pager,
            tables,
            columns,
            write_through,
        })
    }

    /// Attach to system tables recorded in the file header
    pub fn open(pager: Arc<Pager>, tables: TableRoots, columns: TableRoots, write_through: bool) -> Self {
        let open_system = |name: &str, roots: TableRoots| {
            Table::open(
                Arc::clone(&pager),
                name,
                roots.root_page,
                roots.first_data_page,
                Schema::default(),
                write_through,
            )
        };
        let tables = open_system("tables", tables);
        let columns = open_system("columns", columns);
        Self {
            pager,
            tables,
            columns,
            write_through,
        }
    }

    /// Current roots of (tables catalog, columns catalog)
    pub fn roots(&self) -> (TableRoots, TableRoots) {
        let roots = |table: &Table| TableRoots {
            root_page: table.root_page(),
            first_data_page: table.first_data_page(),
        };
        (roots(&self.tables), roots(&self.columns))
    }

    /// Create a new empty table and record it
    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<Table> {
        validate_name(name)?;
        schema.key_column()?;

        let key = table_key(name);
        if let Some(bytes) = self.tables.find_record(key)? {
            let existing = CatalogRecord::from_bytes(&bytes)?;
            if existing.name != name {
                warn!(requested = name, stored = %existing.name, key, "table name hash collision");
            }
            return Err(StorageError::TableExists(name.to_string()));
        }

        // both catalog rows must fit before any page is allocated
        let json = schema.to_json()?;
        self.columns.check_record_size(json.as_bytes())?;

        let table = Table::create(Arc::clone(&self.pager), name, schema, self.write_through)?;
        let record = CatalogRecord {
            name: name.to_string(),
            root_page: table.root_page(),
            first_data_page: table.first_data_page(),
            column_count: table.schema().len() as u32,
        };
        self.tables.insert_record(key, &record.to_bytes())?;
        self.columns.insert_record(key, json.as_bytes())?;

        debug!(table = name, key, "registered table");
        Ok(table)
    }

    /// Reconstruct a table from its catalog entries
    pub fn open_table(&self, name: &str) -> Result<Table> {
        let key = table_key(name);
        let record = match self.tables.find_record(key)? {
            Some(bytes) => CatalogRecord::from_bytes(&bytes)?,
            None => return Err(StorageError::TableNotFound(name.to_string())),
        };
        if record.name != name {
            warn!(requested = name, stored = %record.name, key, "table name hash collision");
        }

        let json = self
            .columns
            .find_record(key)?
            .ok_or_else(|| StorageError::corruption(format!("no schema stored for '{}'", name)))?;
        let json = String::from_utf8(json)
            .map_err(|_| StorageError::corruption(format!("schema of '{}' is not UTF-8", name)))?;
        let schema = Schema::from_json(&json)?;
        if schema.len() != record.column_count as usize {
            return Err(StorageError::corruption(format!(
                "'{}' records {} columns but its schema has {}",
                name,
                record.column_count,
                schema.len()
            )));
        }

        debug!(table = %record.name, root = %record.root_page, "opened table");
        Ok(Table::open(
            Arc::clone(&self.pager),
            record.name,
            record.root_page,
            record.first_data_page,
            schema,
            self.write_through,
        ))
    }

    /// Persist the current roots of every given table, then flush
    pub fn close_all<'a, I>(&mut self, tables: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Table>,
    {
        for table in tables {
            let key = table_key(table.name());
            let bytes = self
                .tables
                .find_record(key)?
                .ok_or_else(|| StorageError::TableNotFound(table.name().to_string()))?;

            let mut record = CatalogRecord::from_bytes(&bytes)?;
            record.root_page = table.root_page();
            record.first_data_page = table.first_data_page();
            self.tables.overwrite_record(key, &record.to_bytes())?;
        }

        self.pager.flush_dirty()?;
        Ok(())
    }

    /// Names of every table in catalog key order
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in self.tables.entries()? {
            let (_, record) = entry?;
            let bytes = self.tables.read_record(record)?;
            names.push(CatalogRecord::from_bytes(&bytes)?.name);
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataType, Row};
    use crate::storage::DiskManagerImpl;
    use crate::types::PAGE_SIZE;
    use tempfile::{tempdir, TempDir};

    fn create_test_catalog() -> Result<(Catalog, TempDir)> {
        create_sized_catalog(PAGE_SIZE)
    }

    fn create_sized_catalog(page_size: usize) -> Result<(Catalog, TempDir)> {
        let dir = tempdir().unwrap();
        let dm = Arc::new(DiskManagerImpl::open(
            &dir.path().join("catalog.db"),
            page_size,
            false,
        )?);
        let pager = Arc::new(Pager::new(dm)?);
        Ok((Catalog::bootstrap(pager, false)?, dir))
    }

    fn schema() -> Schema {
        Schema::new([("id", DataType::Integer), ("name", DataType::Text)]).unwrap()
    }

    #[test]
    fn test_record_layout() -> Result<()> {
        let record = CatalogRecord {
            name: "users".to_string(),
            root_page: PageId::new(5),
            first_data_page: PageId::new(6),
            column_count: 2,
        };
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[..5], b"users");
        assert!(bytes[5..32].iter().all(|&b| b == 0));
        assert_eq!(&bytes[32..36], &[0, 0, 0, 5]);
        assert_eq!(CatalogRecord::from_bytes(&bytes)?, record);
        Ok(())
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("users").is_ok());
        assert!(validate_name(&"a".repeat(32)).is_ok());
        assert!(matches!(validate_name(""), Err(StorageError::InvalidName(_))));
        assert!(matches!(
            validate_name(&"a".repeat(33)),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn test_key_is_stable_crc32() {
        assert_eq!(table_key("users"), crc32fast::hash(b"users") as i32);
        assert_ne!(table_key("users"), table_key("Users"));
    }

    #[test]
    fn test_create_and_open() -> Result<()> {
        let (mut catalog, _dir) = create_test_catalog()?;
        let mut created = catalog.create_table("users", schema())?;
        created.insert(1, &Row::new().with("id", 1).with("name", "ann"))?;

        let opened = catalog.open_table("users")?;
        assert_eq!(opened.schema(), &schema());
        assert_eq!(opened.root_page(), created.root_page());
        assert_eq!(
            opened.find(1)?,
            Some(Row::new().with("id", 1).with("name", "ann"))
        );
        Ok(())
    }

    #[test]
    fn test_create_existing_fails() -> Result<()> {
        let (mut catalog, _dir) = create_test_catalog()?;
        catalog.create_table("users", schema())?;
        assert!(matches!(
            catalog.create_table("users", schema()),
            Err(StorageError::TableExists(_))
        ));
        Ok(())
    }

    #[test]
    fn test_open_missing_fails() -> Result<()> {
        let (catalog, _dir) = create_test_catalog()?;
        assert!(matches!(
            catalog.open_table("nope"),
            Err(StorageError::TableNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_close_all_persists_new_root() -> Result<()> {
        let (mut catalog, _dir) = create_test_catalog()?;
        let mut table = catalog.create_table("big", schema())?;
        let first_root = table.root_page();
        for id in 0..20 {
            table.insert(id, &Row::new().with("id", id).with("name", "x"))?;
        }
        assert_ne!(table.root_page(), first_root);

        // stale until closed
        assert_eq!(catalog.open_table("big")?.root_page(), first_root);

        catalog.close_all([&table])?;
        let reopened = catalog.open_table("big")?;
        assert_eq!(reopened.root_page(), table.root_page());
        assert_eq!(reopened.scan(None, None)?.len(), 20);
        Ok(())
    }

    #[test]
    fn test_oversized_schema_leaves_no_trace() -> Result<()> {
        let (mut catalog, _dir) = create_sized_catalog(512)?;
        let wide = Schema::new((0..20).map(|i| (format!("column_{:02}", i), DataType::Integer)))?;
        let pages_before = catalog.pager.page_count();

        assert!(matches!(
            catalog.create_table("wide", wide),
            Err(StorageError::RecordTooLarge { .. })
        ));
        assert_eq!(catalog.pager.page_count(), pages_before);
        assert!(catalog.list_tables()?.is_empty());
        assert!(matches!(
            catalog.open_table("wide"),
            Err(StorageError::TableNotFound(_))
        ));

        // the name is still free
        catalog.create_table("wide", schema())?;
        assert_eq!(catalog.open_table("wide")?.schema(), &schema());
        Ok(())
    }

    #[test]
    fn test_colliding_name_resolves_to_stored_table() -> Result<()> {
        assert_eq!(table_key("plumless"), table_key("buckeroo"));

        let (mut catalog, _dir) = create_test_catalog()?;
        let stored = catalog.create_table("plumless", schema())?;
        assert!(matches!(
            catalog.create_table("buckeroo", schema()),
            Err(StorageError::TableExists(_))
        ));

        let opened = catalog.open_table("buckeroo")?;
        assert_eq!(opened.name(), "plumless");
        assert_eq!(opened.root_page(), stored.root_page());
        assert_eq!(catalog.list_tables()?, vec!["plumless"]);
        Ok(())
    }

    #[test]
    fn test_list_tables() -> Result<()> {
        let (mut catalog, _dir) = create_test_catalog()?;
        for name in ["a", "b", "c", "d", "e", "f", "g"] {
            catalog.create_table(name, schema())?;
        }
        let mut names = catalog.list_tables()?;
        names.sort();
        assert_eq!(names, vec!["a", "b", "c", "d", "e", "f", "g"]);
        Ok(())
    }
}
