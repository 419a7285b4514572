//! QuillDB - a small embedded relational database engine written in Rust
//!
//! This library provides the core components of the engine:
//! - Typed values and fixed-width record frames
//! - Primary-key B+ tree index per table
//! - Persistent catalog of databases, tables, and file paths
//! - Query executor with WHERE filters and nested-loop JOIN

pub mod catalog;
pub mod error;
pub mod executor;
pub mod query;
pub mod storage;

pub use error::{Error, Result};
pub use executor::{Engine, QueryResult};
