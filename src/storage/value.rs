//! Field values for QuillDB
//!
//! This module defines how data values are represented in memory and how
//! they compare inside WHERE conditions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single typed field value.
///
/// CHAR columns produce `Str` values; the fixed-length nature of CHAR
/// lives in the column type, not in the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit IEEE float
    Float(f32),
    /// UTF-8 string
    Str(String),
    /// Boolean
    Bool(bool),
}

// Equality holds only between matching tags.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => false,
        }
    }
}

/// Comparison operators accepted in WHERE conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "=" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::NotEq),
            ">" => Ok(CompareOp::Gt),
            "<" => Ok(CompareOp::Lt),
            ">=" => Ok(CompareOp::Ge),
            "<=" => Ok(CompareOp::Le),
            other => Err(format!("unknown comparison operator '{}'", other)),
        }
    }
}

impl Value {
    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "INT",
            Value::Float(_) => "FLOAT",
            Value::Str(_) => "STRING",
            Value::Bool(_) => "BOOL",
        }
    }

    /// Apply `op` between this value and `other`.
    ///
    /// Mismatched tags yield `false` for every operator, including `!=`,
    /// so a mistyped predicate never promotes into a match. Integers,
    /// floats, and strings order normally; booleans answer only equality.
    pub fn compare(&self, other: &Value, op: CompareOp) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => op.holds(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => {
                a.partial_cmp(b).map_or(false, |ordering| op.holds(ordering))
            }
            (Value::Str(a), Value::Str(b)) => op.holds(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => match op {
                CompareOp::Eq => a == b,
                CompareOp::NotEq => a != b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_tag_comparison() {
        assert!(Value::Int(5).compare(&Value::Int(3), CompareOp::Gt));
        assert!(Value::Int(5).compare(&Value::Int(5), CompareOp::Ge));
        assert!(Value::Float(1.5).compare(&Value::Float(2.0), CompareOp::Lt));
        assert!(Value::Str("abc".into()).compare(&Value::Str("abd".into()), CompareOp::Lt));
        assert!(Value::Bool(true).compare(&Value::Bool(true), CompareOp::Eq));
        assert!(Value::Bool(true).compare(&Value::Bool(false), CompareOp::NotEq));
    }

    #[test]
    fn test_mismatched_tags_never_match() {
        let int = Value::Int(1);
        let text = Value::Str("alice".into());
        for op in [
            CompareOp::Eq,
            CompareOp::NotEq,
            CompareOp::Gt,
            CompareOp::Lt,
            CompareOp::Ge,
            CompareOp::Le,
        ] {
            assert!(!int.compare(&text, op), "{} should not hold", op);
            assert!(!text.compare(&int, op), "{} should not hold", op);
        }
        assert_ne!(int, text);
    }

    #[test]
    fn test_bools_are_unordered() {
        assert!(!Value::Bool(true).compare(&Value::Bool(false), CompareOp::Gt));
        assert!(!Value::Bool(false).compare(&Value::Bool(true), CompareOp::Le));
    }

    #[test]
    fn test_compare_op_parsing() {
        assert_eq!("<=".parse::<CompareOp>(), Ok(CompareOp::Le));
        assert_eq!("=".parse::<CompareOp>(), Ok(CompareOp::Eq));
        assert!("<>".parse::<CompareOp>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Bool(true).to_string(), "TRUE");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(CompareOp::NotEq.to_string(), "!=");
    }
}
