//! Schema definitions for QuillDB
//!
//! This module defines columns, table schemas, and databases.

use super::types::DataType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A foreign-key declaration. Persisted in the catalog but not enforced
/// at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced table
    pub table: String,
    /// Referenced column
    pub column: String,
}

/// Column definition in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Is this the primary key?
    pub primary_key: bool,
    /// Foreign-key reference, if declared
    pub references: Option<ForeignKey>,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            references: None,
        }
    }

    /// Set primary key flag
    pub fn primary_key(mut self, pk: bool) -> Self {
        self.primary_key = pk;
        self
    }

    /// Declare a foreign-key reference
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// On-disk width of this column's field in bytes.
    pub fn width(&self) -> usize {
        self.data_type.width()
    }
}

/// Table schema - column layout plus the table's file locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Ordered list of columns; disk layout follows this order
    pub columns: Vec<Column>,
    /// Path of the data file
    pub data_path: PathBuf,
    /// Path of the primary-key index file
    pub index_path: PathBuf,
}

impl TableSchema {
    /// Create a schema with its data and index files under `db_dir`.
    pub fn new(name: impl Into<String>, columns: Vec<Column>, db_dir: &Path) -> Self {
        let name = name.into();
        let data_path = db_dir.join(format!("{}.dat", name));
        let index_path = db_dir.join(format!("{}.idx", name));
        Self {
            name,
            columns,
            data_path,
            index_path,
        }
    }

    /// Get column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check if column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The primary-key column, if the table declares one.
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Total byte length of one record frame: the sum of per-column widths
    /// in schema order.
    pub fn row_width(&self) -> usize {
        self.columns.iter().map(Column::width).sum()
    }
}

/// A named group of tables backed by one directory under the data root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    /// Database name
    pub name: String,
    /// Table schemas belonging to this database
    pub tables: Vec<TableSchema>,
}

impl Database {
    /// Create a new empty database entry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }

    /// Get a table schema by name
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Check if a table exists
    pub fn has_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Get all table names
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> TableSchema {
        let columns = vec![
            Column::new("id", DataType::Int).primary_key(true),
            Column::new("name", DataType::Str(16)),
            Column::new("initials", DataType::Char(2)),
            Column::new("score", DataType::Float),
            Column::new("active", DataType::Bool),
        ];
        TableSchema::new("users", columns, Path::new("/tmp/db"))
    }

    #[test]
    fn test_row_width() {
        // 4 + (4 + 16) + 2 + 4 + 1
        assert_eq!(users_schema().row_width(), 31);
    }

    #[test]
    fn test_primary_key_lookup() {
        let schema = users_schema();
        assert_eq!(schema.primary_key().map(|c| c.name.as_str()), Some("id"));
        assert!(schema.has_column("score"));
        assert!(!schema.has_column("missing"));
    }

    #[test]
    fn test_file_paths() {
        let schema = users_schema();
        assert_eq!(schema.data_path, Path::new("/tmp/db/users.dat"));
        assert_eq!(schema.index_path, Path::new("/tmp/db/users.idx"));
    }

    #[test]
    fn test_foreign_key_declaration() {
        let column = Column::new("uid", DataType::Int).references("users", "id");
        let fk = column.references.as_ref().unwrap();
        assert_eq!(fk.table, "users");
        assert_eq!(fk.column, "id");
    }
}
