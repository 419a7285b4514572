//! Query module
//!
//! This module contains the parsed statement types and the WHERE-clause
//! predicate engine.

pub mod ast;
pub mod predicate;

pub use ast::{ColumnDef, CreateTable, ForeignKeyDef, JoinClause, Select, Statement, Update};
pub use predicate::{Condition, Filter, LogicOp};
