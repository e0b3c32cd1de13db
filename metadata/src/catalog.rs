//! Catalog module - manages the schema metadata of a single database.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::system::{DatabaseMetadata, SystemCatalog, UserMetadata};
use crate::types::{Encoding, SqlType};

/// Storage tier of a table or materialized view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageOption {
    Gpu,
    Cpu,
    Disk,
}

/// Refresh policy of a materialized view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshOption {
    Auto,
    Manual,
    Immediate,
}

/// Row-to-fragment assignment scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmenterType {
    InsertOrder,
}

/// Metadata of one table or view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_id: i32,
    pub table_name: String,
    pub n_columns: usize,
    pub is_view: bool,
    pub is_materialized: bool,
    /// Canonical SQL text of the defining query; empty for base tables.
    pub view_sql: String,
    pub storage: StorageOption,
    pub refresh: RefreshOption,
    pub check_option: bool,
    /// Whether the contents can be scanned. Materialized views start out not
    /// ready and become ready on their first refresh.
    pub is_ready: bool,
    pub frag_type: FragmenterType,
    pub max_frag_rows: i64,
    pub frag_page_size: i64,
}

/// Metadata of one column. `column_id` is 1-based within its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub table_id: i32,
    pub column_id: i32,
    pub column_name: String,
    pub column_type: SqlType,
    pub compression: Encoding,
    pub comp_param: i32,
}

/// Error for [`Catalog`] and [`crate::system::SysCatalog`] related operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("table '{0}' already exists")]
    TableAlreadyExists(String),
    #[error("table '{0}' not found")]
    TableNotFound(String),
    #[error("database '{0}' already exists")]
    DatabaseAlreadyExists(String),
    #[error("database '{0}' not found")]
    DatabaseNotFound(String),
    #[error("user '{0}' already exists")]
    UserAlreadyExists(String),
    #[error("user '{0}' not found")]
    UserNotFound(String),
    #[error("io error occurred: {0}")]
    IoError(#[from] io::Error),
    #[error("json error occurred: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Read and table-level mutation access to the schema metadata of the
/// session's database. The analyzer only reads through this interface; the
/// statement executor also creates and drops tables.
pub trait SchemaCatalog {
    /// Returns the table or view with the given name.
    fn table(&self, table_name: &str) -> Option<TableDescriptor>;

    /// Returns the named column of the given table.
    fn column(&self, table_id: i32, column_name: &str) -> Option<ColumnDescriptor>;

    /// Returns the column of the given table by its 1-based id.
    fn column_by_id(&self, table_id: i32, column_id: i32) -> Option<ColumnDescriptor>;

    /// Returns all columns of the given table ordered by column id.
    fn table_columns(&self, table_id: i32) -> Vec<ColumnDescriptor>;

    /// Registers a new table together with its columns. Ids are assigned by
    /// the catalog; the ids carried by the inputs are ignored.
    fn create_table(
        &mut self,
        td: TableDescriptor,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<(), CatalogError>;

    /// Removes a table and its columns.
    fn drop_table(&mut self, table_name: &str) -> Result<(), CatalogError>;

    fn current_database(&self) -> &DatabaseMetadata;

    fn current_user(&self) -> &UserMetadata;

    /// Administration interface of the system catalog. Plain per-database
    /// catalogs return `None`.
    fn as_system(&mut self) -> Option<&mut dyn SystemCatalog> {
        None
    }
}

/// In-memory schema store for one database.
///
/// The catalog is created once per session. Tables and columns are assumed to
/// be few enough to keep fully in memory; an optional JSON snapshot mirrors
/// the state to disk.
#[derive(Debug)]
pub struct Catalog {
    db: DatabaseMetadata,
    user: UserMetadata,
    tables: HashMap<String, TableDescriptor>,
    /// Columns of every table, keyed by table id, ordered by column id.
    columns: HashMap<i32, Vec<ColumnDescriptor>>,
    next_table_id: i32,
    file_path: Option<PathBuf>,
}

impl Catalog {
    /// Creates an empty catalog for the given database and session user.
    pub fn new(db: DatabaseMetadata, user: UserMetadata) -> Self {
        Catalog {
            db,
            user,
            tables: HashMap::new(),
            columns: HashMap::new(),
            next_table_id: 1,
            file_path: None,
        }
    }

    /// Loads a catalog from a JSON snapshot produced by [`Catalog::sync_to_disk`].
    pub fn load<P: AsRef<Path>>(
        path: P,
        db: DatabaseMetadata,
        user: UserMetadata,
    ) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path.as_ref())?;
        let snapshot: CatalogSnapshot = serde_json::from_str(&content)?;
        let mut columns: HashMap<i32, Vec<ColumnDescriptor>> = HashMap::new();
        for cd in snapshot.columns {
            columns.entry(cd.table_id).or_default().push(cd);
        }
        for cols in columns.values_mut() {
            cols.sort_by_key(|cd| cd.column_id);
        }
        let next_table_id = snapshot
            .tables
            .iter()
            .map(|td| td.table_id)
            .max()
            .unwrap_or(0)
            + 1;
        Ok(Catalog {
            db,
            user,
            tables: snapshot
                .tables
                .into_iter()
                .map(|td| (td.table_name.clone(), td))
                .collect(),
            columns,
            next_table_id,
            file_path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// Writes the current state to the snapshot file, if one is configured.
    pub fn sync_to_disk(&self) -> Result<(), CatalogError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let snapshot = CatalogSnapshot {
            tables: self.tables.values().cloned().collect(),
            columns: self.columns.values().flatten().cloned().collect(),
        };
        fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(())
    }

    /// Attaches a snapshot file to an in-memory catalog.
    pub fn with_file_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file_path = Some(path.as_ref().to_path_buf());
        self
    }
}

impl SchemaCatalog for Catalog {
    fn table(&self, table_name: &str) -> Option<TableDescriptor> {
        self.tables.get(table_name).cloned()
    }

    fn column(&self, table_id: i32, column_name: &str) -> Option<ColumnDescriptor> {
        self.columns
            .get(&table_id)?
            .iter()
            .find(|cd| cd.column_name == column_name)
            .cloned()
    }

    fn column_by_id(&self, table_id: i32, column_id: i32) -> Option<ColumnDescriptor> {
        self.columns
            .get(&table_id)?
            .iter()
            .find(|cd| cd.column_id == column_id)
            .cloned()
    }

    fn table_columns(&self, table_id: i32) -> Vec<ColumnDescriptor> {
        self.columns.get(&table_id).cloned().unwrap_or_default()
    }

    fn create_table(
        &mut self,
        mut td: TableDescriptor,
        mut columns: Vec<ColumnDescriptor>,
    ) -> Result<(), CatalogError> {
        if self.tables.contains_key(&td.table_name) {
            return Err(CatalogError::TableAlreadyExists(td.table_name));
        }
        td.table_id = self.next_table_id;
        self.next_table_id += 1;
        td.n_columns = columns.len();
        for (idx, cd) in columns.iter_mut().enumerate() {
            cd.table_id = td.table_id;
            cd.column_id = idx as i32 + 1;
        }
        self.columns.insert(td.table_id, columns);
        self.tables.insert(td.table_name.clone(), td);
        Ok(())
    }

    fn drop_table(&mut self, table_name: &str) -> Result<(), CatalogError> {
        let td = self
            .tables
            .remove(table_name)
            .ok_or_else(|| CatalogError::TableNotFound(table_name.into()))?;
        self.columns.remove(&td.table_id);
        Ok(())
    }

    fn current_database(&self) -> &DatabaseMetadata {
        &self.db
    }

    fn current_user(&self) -> &UserMetadata {
        &self.user
    }
}

/// On-disk representation of a [`Catalog`]. Used only for the JSON snapshot.
#[derive(Serialize, Deserialize)]
struct CatalogSnapshot {
    tables: Vec<TableDescriptor>,
    columns: Vec<ColumnDescriptor>,
}
