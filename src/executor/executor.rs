//! Query executor for QuillDB
//!
//! The engine owns the catalog, the current-database selection, and the
//! open primary-key indexes, and dispatches parsed statements against
//! them. Failures never escape `execute` as errors or panics; every
//! statement yields an explicit outcome.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use tracing::info;

use crate::catalog::{Catalog, Column, TableSchema};
use crate::error::{Error, Result};
use crate::query::ast::{CreateTable, JoinClause, Select, Statement, Update};
use crate::query::predicate::{Condition, Filter};
use crate::storage::btree::BPlusTree;
use crate::storage::record::Record;
use crate::storage::table::TableStore;
use crate::storage::value::{CompareOp, Value};

/// Outcome of one statement
#[derive(Debug, Default)]
pub struct QueryResult {
    /// False when the statement failed
    pub ok: bool,
    /// Result rows for SELECT and SHOW
    pub rows: Vec<Record>,
    /// Rows returned, inserted, updated, or deleted
    pub count: usize,
    /// Failure reason or informational note
    pub message: Option<String>,
}

impl QueryResult {
    /// A success carrying result rows
    pub fn with_rows(rows: Vec<Record>) -> Self {
        Self {
            ok: true,
            count: rows.len(),
            rows,
            message: None,
        }
    }

    /// A success carrying an affected-row count
    pub fn with_count(count: usize, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            rows: Vec::new(),
            count,
            message: Some(message.into()),
        }
    }

    /// A success carrying a message
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            rows: Vec::new(),
            count: 0,
            message: Some(message.into()),
        }
    }

    /// A failure carrying the reason
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            rows: Vec::new(),
            count: 0,
            message: Some(message.into()),
        }
    }
}

/// The database engine
pub struct Engine {
    /// System catalog
    catalog: Catalog,
    /// Currently selected database
    current: Option<String>,
    /// Open indexes for the current database, by table name
    indexes: HashMap<String, BPlusTree>,
}

impl Engine {
    /// Open the engine over a data root, loading the catalog (or
    /// starting one) at `<root>/catalog.bin`.
    pub fn open(data_root: impl Into<PathBuf>) -> Result<Self> {
        let catalog = Catalog::open(data_root)?;
        Ok(Self {
            catalog,
            current: None,
            indexes: HashMap::new(),
        })
    }

    /// The system catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Name of the currently selected database
    pub fn current_database(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Execute one parsed statement.
    ///
    /// Every failure - schema violation, corruption, I/O - is reported
    /// through the returned result rather than an `Err`.
    pub fn execute(&mut self, statement: Statement) -> QueryResult {
        match self.dispatch(statement) {
            Ok(result) => result,
            Err(e) => QueryResult::failure(e.to_string()),
        }
    }

    fn dispatch(&mut self, statement: Statement) -> Result<QueryResult> {
        match statement {
            Statement::CreateDatabase { name } => {
                self.catalog.create_database(&name)?;
                Ok(QueryResult::with_message(format!(
                    "database '{}' created",
                    name
                )))
            }
            Statement::DropDatabase { name } => self.drop_database(&name),
            Statement::UseDatabase { name } => self.use_database(&name),
            Statement::ShowDatabases => {
                let rows: Vec<Record> = self
                    .catalog
                    .database_names()
                    .into_iter()
                    .map(|name| {
                        let mut rec = Record::new();
                        rec.set("database", name);
                        rec
                    })
                    .collect();
                Ok(QueryResult::with_rows(rows))
            }
            Statement::CreateTable(stmt) => self.create_table(stmt),
            Statement::DropTable { name } => self.drop_table(&name),
            Statement::ShowTables => {
                let db = self.current()?;
                let rows: Vec<Record> = self
                    .catalog
                    .database(&db)?
                    .table_names()
                    .into_iter()
                    .map(|name| {
                        let mut rec = Record::new();
                        rec.set("table", name);
                        rec
                    })
                    .collect();
                Ok(QueryResult::with_rows(rows))
            }
            Statement::Insert { table, record } => self.insert(&table, &record),
            Statement::Select(stmt) => self.select(stmt),
            Statement::Update(stmt) => self.update(stmt),
            Statement::Delete { table, filter } => self.delete(&table, &filter),
        }
    }

    fn current(&self) -> Result<String> {
        self.current.clone().ok_or(Error::NoDatabaseSelected)
    }

    fn use_database(&mut self, name: &str) -> Result<QueryResult> {
        if !self.catalog.has_database(name) {
            return Err(Error::DatabaseNotFound(name.to_string()));
        }
        // indexes of the previous database are already flushed; open the
        // new database's indexes, rebuilding any stale ones
        self.indexes.clear();
        let schemas: Vec<TableSchema> = self.catalog.database(name)?.tables.clone();
        for schema in &schemas {
            let index = TableStore::new(schema).open_index()?;
            self.indexes.insert(schema.name.clone(), index);
        }
        self.current = Some(name.to_string());
        info!(database = %name, "using database");
        Ok(QueryResult::with_message(format!("using database '{}'", name)))
    }

    fn drop_database(&mut self, name: &str) -> Result<QueryResult> {
        self.catalog.drop_database(name)?;
        if self.current.as_deref() == Some(name) {
            self.current = None;
            self.indexes.clear();
        }
        Ok(QueryResult::with_message(format!(
            "database '{}' dropped",
            name
        )))
    }

    fn create_table(&mut self, stmt: CreateTable) -> Result<QueryResult> {
        let db = self.current()?;

        if let Some(pk) = &stmt.primary_key {
            if !stmt.columns.iter().any(|c| &c.name == pk) {
                return Err(Error::ColumnNotFound(pk.clone(), stmt.name.clone()));
            }
        }

        let columns: Vec<Column> = stmt
            .columns
            .iter()
            .map(|def| {
                let mut column = Column::new(&def.name, def.data_type)
                    .primary_key(stmt.primary_key.as_deref() == Some(def.name.as_str()));
                if let Some(fk) = stmt.foreign_keys.iter().find(|fk| fk.column == def.name) {
                    column = column.references(&fk.references_table, &fk.references_column);
                }
                column
            })
            .collect();

        self.catalog.create_table(&db, &stmt.name, columns)?;
        let schema = self.catalog.table(&db, &stmt.name)?.clone();
        let index = TableStore::new(&schema).open_index()?;
        self.indexes.insert(stmt.name.clone(), index);
        Ok(QueryResult::with_message(format!(
            "table '{}' created",
            stmt.name
        )))
    }

    fn drop_table(&mut self, name: &str) -> Result<QueryResult> {
        let db = self.current()?;
        self.indexes.remove(name);
        self.catalog.drop_table(&db, name)?;
        Ok(QueryResult::with_message(format!("table '{}' dropped", name)))
    }

    fn insert(&mut self, table: &str, record: &Record) -> Result<QueryResult> {
        let db = self.current()?;
        let schema = self.catalog.table(&db, table)?.clone();
        let index = Self::index_entry(&mut self.indexes, &schema)?;
        TableStore::new(&schema).insert(index, record)?;
        Ok(QueryResult::with_count(1, "1 record inserted"))
    }

    fn select(&mut self, stmt: Select) -> Result<QueryResult> {
        let db = self.current()?;
        let schema = self.catalog.table(&db, &stmt.table)?.clone();

        if let Some(join) = stmt.join.clone() {
            let right = self.catalog.table(&db, &join.table)?.clone();
            return self.select_join(&stmt, &schema, &right, &join);
        }

        let store = TableStore::new(&schema);
        let rows: Vec<Record> = if stmt.filter.is_empty() {
            store.scan()?
        } else if let Some(key) = point_lookup_key(&schema, &stmt.filter) {
            let index = Self::index_entry(&mut self.indexes, &schema)?;
            store
                .lookup(index, key)?
                .into_iter()
                .filter(|rec| stmt.filter.matches(rec))
                .collect()
        } else {
            store
                .scan()?
                .into_iter()
                .filter(|rec| stmt.filter.matches(rec))
                .collect()
        };

        Ok(QueryResult::with_rows(project(rows, &stmt.columns, &[&schema])))
    }

    fn select_join(
        &mut self,
        stmt: &Select,
        left: &TableSchema,
        right: &TableSchema,
        join: &JoinClause,
    ) -> Result<QueryResult> {
        let (left_col, right_col) = resolve_join_columns(join, left, right)?;

        let left_rows = TableStore::new(left).scan()?;
        let right_rows = TableStore::new(right).scan()?;

        let mut combined = Vec::new();
        for l in &left_rows {
            let Some(left_value) = l.get(&left_col) else {
                continue;
            };
            for r in &right_rows {
                if r.get(&right_col) != Some(left_value) {
                    continue;
                }
                let mut row = Record::new();
                for (column, value) in l.iter() {
                    row.set(format!("{}.{}", left.name, column), value.clone());
                }
                for (column, value) in r.iter() {
                    row.set(format!("{}.{}", right.name, column), value.clone());
                }
                combined.push(row);
            }
        }

        let filter = qualify_filter(&stmt.filter, left, right)?;
        let rows: Vec<Record> = combined
            .into_iter()
            .filter(|rec| filter.matches(rec))
            .collect();

        Ok(QueryResult::with_rows(project(
            rows,
            &stmt.columns,
            &[left, right],
        )))
    }

    fn update(&mut self, stmt: Update) -> Result<QueryResult> {
        let db = self.current()?;
        let schema = self.catalog.table(&db, &stmt.table)?.clone();
        for (column, _) in stmt.assignments.iter() {
            if !schema.has_column(column) {
                return Err(Error::ColumnNotFound(column.clone(), schema.name.clone()));
            }
        }

        let index = Self::index_entry(&mut self.indexes, &schema)?;
        let count = TableStore::new(&schema).update_where(index, &stmt.assignments, &stmt.filter)?;
        Ok(QueryResult::with_count(
            count,
            format!("{} record(s) updated", count),
        ))
    }

    fn delete(&mut self, table: &str, filter: &Filter) -> Result<QueryResult> {
        let db = self.current()?;
        let schema = self.catalog.table(&db, table)?.clone();
        let index = Self::index_entry(&mut self.indexes, &schema)?;
        let count = TableStore::new(&schema).delete_where(index, filter)?;
        Ok(QueryResult::with_count(
            count,
            format!("{} record(s) deleted", count),
        ))
    }

    /// The open index for `schema`, opening it on first touch.
    fn index_entry<'a>(
        indexes: &'a mut HashMap<String, BPlusTree>,
        schema: &TableSchema,
    ) -> Result<&'a mut BPlusTree> {
        match indexes.entry(schema.name.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let index = TableStore::new(schema).open_index()?;
                Ok(entry.insert(index))
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // shutdown flush; per-mutation saves make this best-effort
        let _ = self.catalog.save();
    }
}

/// The single planner rule: an un-negated `pk = <int>` first condition
/// in an OR-free filter is answered through the index. Anything else
/// takes the full scan.
fn point_lookup_key(schema: &TableSchema, filter: &Filter) -> Option<i32> {
    if !filter.is_conjunctive() || filter.negates_first() {
        return None;
    }
    let pk = schema.primary_key()?;
    let first = filter.conditions().first()?;
    if first.column == pk.name && first.op == CompareOp::Eq {
        if let Value::Int(key) = &first.value {
            return Some(*key);
        }
    }
    None
}

/// Resolve a JOIN's ON sides to (left-table column, right-table column).
/// Either side of the equality may name either table.
fn resolve_join_columns(
    join: &JoinClause,
    left: &TableSchema,
    right: &TableSchema,
) -> Result<(String, String)> {
    let split = |side: &str| -> Result<(String, String)> {
        side.split_once('.')
            .map(|(t, c)| (t.to_string(), c.to_string()))
            .ok_or_else(|| {
                Error::InvalidJoin(format!("ON condition must specify table.column, got '{}'", side))
            })
    };
    let (lt, lc) = split(&join.left)?;
    let (rt, rc) = split(&join.right)?;

    let (left_col, right_col) = if lt == left.name && rt == right.name {
        (lc, rc)
    } else if lt == right.name && rt == left.name {
        (rc, lc)
    } else {
        return Err(Error::InvalidJoin(format!(
            "ON condition references tables '{}' and '{}'",
            lt, rt
        )));
    };

    if !left.has_column(&left_col) {
        return Err(Error::ColumnNotFound(left_col, left.name.clone()));
    }
    if !right.has_column(&right_col) {
        return Err(Error::ColumnNotFound(right_col, right.name.clone()));
    }
    Ok((left_col, right_col))
}

/// Qualify a join WHERE clause against the two joined tables: an
/// unqualified column resolves against the left table first, then the
/// right. Already-qualified columns pass through.
fn qualify_filter(filter: &Filter, left: &TableSchema, right: &TableSchema) -> Result<Filter> {
    let conditions: Vec<Condition> = filter
        .conditions()
        .iter()
        .map(|condition| {
            let mut qualified = condition.clone();
            if !condition.column.contains('.') {
                if left.has_column(&condition.column) {
                    qualified.column = format!("{}.{}", left.name, condition.column);
                } else if right.has_column(&condition.column) {
                    qualified.column = format!("{}.{}", right.name, condition.column);
                }
            }
            qualified
        })
        .collect();
    Filter::new(conditions, filter.operators().to_vec())
}

/// Project rows onto the requested column list. `*` keeps every column.
///
/// A requested name resolves in order: exactly; by its base name when
/// qualified; by qualifying it against the given tables (left first)
/// when bare. Rows where nothing resolves are dropped.
fn project(rows: Vec<Record>, columns: &[String], tables: &[&TableSchema]) -> Vec<Record> {
    if columns.iter().any(|c| c == "*") {
        return rows;
    }

    let mut projected = Vec::with_capacity(rows.len());
    for row in rows {
        let mut out = Record::new();
        for column in columns {
            if let Some(value) = row.get(column) {
                out.set(column.clone(), value.clone());
                continue;
            }
            if let Some((_, base)) = column.split_once('.') {
                if let Some(value) = row.get(base) {
                    out.set(column.clone(), value.clone());
                }
                continue;
            }
            for table in tables {
                if let Some(value) = row.get(&format!("{}.{}", table.name, column)) {
                    out.set(column.clone(), value.clone());
                    break;
                }
            }
        }
        if !out.is_empty() {
            projected.push(out);
        }
    }
    projected
}
