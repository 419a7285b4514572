//! System catalog for QuillDB
//!
//! This module manages the persistent directory of databases, their table
//! schemas, and the file paths backing each table.

use super::schema::{Column, Database, TableSchema};
use super::types::DataType;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// The persistent catalog.
///
/// Loaded once at startup from `<root>/catalog.bin` and written back on
/// every schema-level mutation. The data root is injected by the host;
/// per-database directories and per-table files live beneath it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Catalog {
    databases: Vec<Database>,
    #[serde(skip)]
    root: PathBuf,
    #[serde(skip)]
    path: PathBuf,
}

impl Catalog {
    /// Load the catalog from the data root, or start empty if no catalog
    /// file exists yet.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let path = root.join("catalog.bin");

        let mut catalog = if path.exists() {
            let bytes = fs::read(&path)?;
            let (catalog, _) = bincode::serde::decode_from_slice::<Catalog, _>(
                &bytes,
                bincode::config::standard(),
            )
            .map_err(|e| Error::CatalogCorrupt(e.to_string()))?;
            catalog
        } else {
            Self {
                databases: Vec::new(),
                root: PathBuf::new(),
                path: PathBuf::new(),
            }
        };

        catalog.root = root;
        catalog.path = path;
        Ok(catalog)
    }

    /// Write the catalog back to its file.
    pub fn save(&self) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::CatalogCorrupt(e.to_string()))?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// The injected data root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a database's table files.
    pub fn database_dir(&self, db_name: &str) -> PathBuf {
        self.root.join(db_name)
    }

    /// Get a database by name
    pub fn database(&self, name: &str) -> Result<&Database> {
        self.databases
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::DatabaseNotFound(name.to_string()))
    }

    /// Check if a database exists
    pub fn has_database(&self, name: &str) -> bool {
        self.databases.iter().any(|d| d.name == name)
    }

    /// List all database names
    pub fn database_names(&self) -> Vec<String> {
        self.databases.iter().map(|d| d.name.clone()).collect()
    }

    /// Get a table schema from a database
    pub fn table(&self, db_name: &str, table_name: &str) -> Result<&TableSchema> {
        self.database(db_name)?
            .table(table_name)
            .ok_or_else(|| Error::TableNotFound(table_name.to_string()))
    }

    /// Create a new database and its directory
    pub fn create_database(&mut self, name: &str) -> Result<()> {
        if self.has_database(name) {
            return Err(Error::DatabaseAlreadyExists(name.to_string()));
        }
        fs::create_dir_all(self.database_dir(name))?;
        self.databases.push(Database::new(name));
        self.save()?;
        info!(database = %name, "created database");
        Ok(())
    }

    /// Drop a database: remove its directory tree and all schema entries
    pub fn drop_database(&mut self, name: &str) -> Result<()> {
        if !self.has_database(name) {
            return Err(Error::DatabaseNotFound(name.to_string()));
        }
        let dir = self.database_dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        self.databases.retain(|d| d.name != name);
        self.save()?;
        info!(database = %name, "dropped database");
        Ok(())
    }

    /// Create a table in a database.
    ///
    /// At most one column may carry the primary-key flag, and the key
    /// column must be INT. Table files are created lazily on first write.
    pub fn create_table(&mut self, db_name: &str, name: &str, columns: Vec<Column>) -> Result<()> {
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(Error::DuplicateColumn(
                    column.name.clone(),
                    name.to_string(),
                ));
            }
        }

        let keys: Vec<&Column> = columns.iter().filter(|c| c.primary_key).collect();
        if keys.len() > 1 {
            return Err(Error::MultiplePrimaryKeys(name.to_string()));
        }
        if let Some(key) = keys.first() {
            if key.data_type != DataType::Int {
                return Err(Error::PrimaryKeyNotInteger(key.name.clone()));
            }
        }

        let dir = self.database_dir(db_name);
        let db = self
            .databases
            .iter_mut()
            .find(|d| d.name == db_name)
            .ok_or_else(|| Error::DatabaseNotFound(db_name.to_string()))?;
        if db.has_table(name) {
            return Err(Error::TableAlreadyExists(name.to_string()));
        }
        db.tables.push(TableSchema::new(name, columns, &dir));
        self.save()?;
        info!(database = %db_name, table = %name, "created table");
        Ok(())
    }

    /// Drop a table: remove its schema entry and delete both of its files
    pub fn drop_table(&mut self, db_name: &str, name: &str) -> Result<()> {
        let db = self
            .databases
            .iter_mut()
            .find(|d| d.name == db_name)
            .ok_or_else(|| Error::DatabaseNotFound(db_name.to_string()))?;
        let pos = db
            .tables
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))?;
        let schema = db.tables.remove(pos);

        for file in [&schema.data_path, &schema.index_path] {
            if file.exists() {
                fs::remove_file(file)?;
            }
        }
        self.save()?;
        info!(database = %db_name, table = %name, "dropped table");
        Ok(())
    }
}
