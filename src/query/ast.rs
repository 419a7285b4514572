//! Parsed statement types
//!
//! The engine does not read SQL text itself; an outer layer (REPL,
//! tokenizer, grammar) produces these values and hands them to the
//! executor.

use super::predicate::Filter;
use crate::catalog::DataType;
use crate::storage::record::Record;

/// One parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// CREATE DATABASE name
    CreateDatabase { name: String },
    /// DROP DATABASE name
    DropDatabase { name: String },
    /// USE name
    UseDatabase { name: String },
    /// SHOW DATABASES
    ShowDatabases,
    /// CREATE TABLE name (...)
    CreateTable(CreateTable),
    /// DROP TABLE name
    DropTable { name: String },
    /// SHOW TABLES
    ShowTables,
    /// INSERT INTO table VALUES (...)
    Insert { table: String, record: Record },
    /// SELECT cols FROM table [JOIN ...] [WHERE ...]
    Select(Select),
    /// UPDATE table SET ... [WHERE ...]
    Update(Update),
    /// DELETE FROM table [WHERE ...]
    Delete { table: String, filter: Filter },
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    /// Table name
    pub name: String,
    /// Column definitions in declaration order
    pub columns: Vec<ColumnDef>,
    /// Primary-key column name, if declared
    pub primary_key: Option<String>,
    /// Foreign-key declarations
    pub foreign_keys: Vec<ForeignKeyDef>,
}

/// One column in a CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Declared type, with length for STRING/CHAR
    pub data_type: DataType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// `FOREIGN KEY (column) REFERENCES table(column)`
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDef {
    /// Local column
    pub column: String,
    /// Referenced table
    pub references_table: String,
    /// Referenced column
    pub references_column: String,
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Table named in FROM
    pub table: String,
    /// Requested columns; a single `*` selects everything
    pub columns: Vec<String>,
    /// JOIN clause, if present
    pub join: Option<JoinClause>,
    /// WHERE clause; empty matches every row
    pub filter: Filter,
}

impl Select {
    /// Select every column of `table` with no filter
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec!["*".to_string()],
            join: None,
            filter: Filter::all(),
        }
    }
}

/// `JOIN <table> ON <left> = <right>`; both sides are `table.column`
/// qualified names.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// Table to join with
    pub table: String,
    /// Left side of the ON equality
    pub left: String,
    /// Right side of the ON equality
    pub right: String,
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Target table
    pub table: String,
    /// SET assignments, overlaid onto matching records
    pub assignments: Record,
    /// WHERE clause; empty updates every row
    pub filter: Filter,
}
