//! Error types for QuillDB
//!
//! This module defines all error types used throughout the database engine.

use thiserror::Error;

/// The main error type for QuillDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Catalog Errors ==========
    #[error("Catalog error: database '{0}' not found")]
    DatabaseNotFound(String),

    #[error("Catalog error: database '{0}' already exists")]
    DatabaseAlreadyExists(String),

    #[error("Catalog error: no database selected")]
    NoDatabaseSelected,

    #[error("Catalog error: table '{0}' not found")]
    TableNotFound(String),

    #[error("Catalog error: table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Catalog error: column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Catalog error: column '{0}' declared twice in table '{1}'")]
    DuplicateColumn(String, String),

    #[error("Catalog error: catalog file unreadable: {0}")]
    CatalogCorrupt(String),

    // ========== Schema Errors ==========
    #[error("Schema error: record is missing primary key '{0}'")]
    MissingPrimaryKey(String),

    #[error("Schema error: primary key column '{0}' must be INT")]
    PrimaryKeyNotInteger(String),

    #[error("Schema error: table '{0}' declares more than one primary key")]
    MultiplePrimaryKeys(String),

    #[error("Schema error: duplicate primary key {1} in table '{0}'")]
    DuplicateKey(String, i32),

    #[error("type mismatch on column {0}")]
    TypeMismatch(String),

    // ========== Query Errors ==========
    #[error("Filter error: {0} operators for {1} conditions")]
    MalformedFilter(usize, usize),

    #[error("Join error: {0}")]
    InvalidJoin(String),

    // ========== Storage Errors ==========
    #[error("Storage error: corrupt or truncated table '{0}'")]
    CorruptTable(String),

    #[error("Storage error: index file unreadable: {0}")]
    CorruptIndex(String),

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for QuillDB operations
pub type Result<T> = std::result::Result<T, Error>;
