//! Query execution module
//!
//! This module contains the engine that dispatches parsed statements.

pub mod executor;

pub use executor::{Engine, QueryResult};
