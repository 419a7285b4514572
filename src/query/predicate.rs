//! WHERE-clause filters
//!
//! A filter is a pair of parallel vectors: the conditions, and the
//! AND/OR/NOT operators joining them in query order. Conditions combine
//! strictly left to right with no SQL precedence; NOT is unary and
//! negates the condition it precedes.

use crate::error::{Error, Result};
use crate::storage::record::Record;
use crate::storage::value::{CompareOp, Value};

/// A single `column op literal` test against one record
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column to test
    pub column: String,
    /// Comparison operator
    pub op: CompareOp,
    /// Literal to compare against
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// True when the record carries the column and the comparison holds.
    /// An absent column never matches.
    pub fn matches(&self, rec: &Record) -> bool {
        rec.get(&self.column)
            .map_or(false, |value| value.compare(&self.value, self.op))
    }
}

/// Connectives between conditions, in query order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
    Not,
}

/// A WHERE clause. An empty clause matches every record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
    operators: Vec<LogicOp>,
}

impl Filter {
    /// A filter that matches everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Build a filter, validating the operator count: for `n` conditions
    /// the operator list must hold between `n - 1` and `n - 1 + #NOT`
    /// entries.
    pub fn new(conditions: Vec<Condition>, operators: Vec<LogicOp>) -> Result<Self> {
        let nots = operators
            .iter()
            .filter(|op| matches!(op, LogicOp::Not))
            .count();
        let connectives = conditions.len().saturating_sub(1);
        if operators.len() < connectives
            || operators.len() > connectives + nots
            || (conditions.is_empty() && !operators.is_empty())
        {
            return Err(Error::MalformedFilter(operators.len(), conditions.len()));
        }
        Ok(Self {
            conditions,
            operators,
        })
    }

    /// Shorthand for a single-condition filter
    pub fn single(condition: Condition) -> Self {
        Self {
            conditions: vec![condition],
            operators: Vec::new(),
        }
    }

    /// True when the clause has no conditions
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The conditions in query order
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// The operators in query order
    pub fn operators(&self) -> &[LogicOp] {
        &self.operators
    }

    /// True when no OR connective appears
    pub fn is_conjunctive(&self) -> bool {
        !self.operators.contains(&LogicOp::Or)
    }

    /// True when the first condition is negated by a preceding NOT
    pub fn negates_first(&self) -> bool {
        let leading = self
            .operators
            .iter()
            .take_while(|op| matches!(op, LogicOp::Not))
            .count();
        leading % 2 == 1
    }

    /// Evaluate the clause against one record.
    ///
    /// Each NOT flips the condition it precedes; the per-condition
    /// booleans then fold left to right through the AND/OR connectives.
    pub fn matches(&self, rec: &Record) -> bool {
        if self.conditions.is_empty() {
            return true;
        }

        let mut negated = vec![false; self.conditions.len()];
        let mut connectives = Vec::with_capacity(self.conditions.len().saturating_sub(1));
        let mut upcoming = 0;
        for op in &self.operators {
            match op {
                LogicOp::Not => {
                    if upcoming < negated.len() {
                        negated[upcoming] = !negated[upcoming];
                    }
                }
                LogicOp::And | LogicOp::Or => {
                    connectives.push(*op);
                    upcoming += 1;
                }
            }
        }

        let mut acc = self.conditions[0].matches(rec) != negated[0];
        for (i, connective) in connectives.iter().enumerate() {
            let Some(condition) = self.conditions.get(i + 1) else {
                break;
            };
            let rhs = condition.matches(rec) != negated[i + 1];
            acc = if matches!(connective, LogicOp::And) {
                acc && rhs
            } else {
                acc || rhs
            };
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut rec = Record::new();
        rec.set("id", 3);
        rec.set("name", "alice");
        rec.set("active", true);
        rec
    }

    fn cond(column: &str, op: CompareOp, value: impl Into<Value>) -> Condition {
        Condition::new(column, op, value)
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::all().matches(&sample()));
        assert!(Filter::all().matches(&Record::new()));
    }

    #[test]
    fn test_single_condition() {
        let filter = Filter::single(cond("id", CompareOp::Eq, 3));
        assert!(filter.matches(&sample()));

        let filter = Filter::single(cond("id", CompareOp::Gt, 3));
        assert!(!filter.matches(&sample()));
    }

    #[test]
    fn test_absent_column_never_matches() {
        let filter = Filter::single(cond("missing", CompareOp::Eq, 1));
        assert!(!filter.matches(&sample()));
    }

    #[test]
    fn test_mismatched_value_type_never_matches() {
        // id is INT; a string literal must not match under any operator
        let filter = Filter::single(cond("id", CompareOp::NotEq, "alice"));
        assert!(!filter.matches(&sample()));
    }

    #[test]
    fn test_and_or_fold_left_to_right() {
        // id = 3 AND name = 'bob' -> false
        let filter = Filter::new(
            vec![
                cond("id", CompareOp::Eq, 3),
                cond("name", CompareOp::Eq, "bob"),
            ],
            vec![LogicOp::And],
        )
        .unwrap();
        assert!(!filter.matches(&sample()));

        // id = 3 OR name = 'bob' -> true
        let filter = Filter::new(
            vec![
                cond("id", CompareOp::Eq, 3),
                cond("name", CompareOp::Eq, "bob"),
            ],
            vec![LogicOp::Or],
        )
        .unwrap();
        assert!(filter.matches(&sample()));

        // no precedence: (false AND true) OR true -> true
        let filter = Filter::new(
            vec![
                cond("id", CompareOp::Eq, 9),
                cond("active", CompareOp::Eq, true),
                cond("name", CompareOp::Eq, "alice"),
            ],
            vec![LogicOp::And, LogicOp::Or],
        )
        .unwrap();
        assert!(filter.matches(&sample()));
    }

    #[test]
    fn test_not_negates_following_condition() {
        // NOT id = 9 -> true
        let filter = Filter::new(
            vec![cond("id", CompareOp::Eq, 9)],
            vec![LogicOp::Not],
        )
        .unwrap();
        assert!(filter.matches(&sample()));
        assert!(filter.negates_first());

        // id = 3 AND NOT name = 'bob' -> true
        let filter = Filter::new(
            vec![
                cond("id", CompareOp::Eq, 3),
                cond("name", CompareOp::Eq, "bob"),
            ],
            vec![LogicOp::And, LogicOp::Not],
        )
        .unwrap();
        assert!(filter.matches(&sample()));
        assert!(!filter.negates_first());
    }

    #[test]
    fn test_double_not_cancels() {
        let filter = Filter::new(
            vec![cond("id", CompareOp::Eq, 3)],
            vec![LogicOp::Not, LogicOp::Not],
        )
        .unwrap();
        assert!(filter.matches(&sample()));
        assert!(!filter.negates_first());
    }

    #[test]
    fn test_operator_count_validation() {
        // two conditions need one connective
        let result = Filter::new(
            vec![
                cond("id", CompareOp::Eq, 1),
                cond("id", CompareOp::Eq, 2),
            ],
            Vec::new(),
        );
        assert!(matches!(result, Err(Error::MalformedFilter(0, 2))));

        // too many connectives
        let result = Filter::new(
            vec![cond("id", CompareOp::Eq, 1)],
            vec![LogicOp::And],
        );
        assert!(matches!(result, Err(Error::MalformedFilter(1, 1))));

        // operators with no conditions
        let result = Filter::new(Vec::new(), vec![LogicOp::Not]);
        assert!(matches!(result, Err(Error::MalformedFilter(1, 0))));
    }

    #[test]
    fn test_is_conjunctive() {
        let filter = Filter::new(
            vec![
                cond("id", CompareOp::Eq, 1),
                cond("id", CompareOp::Eq, 2),
            ],
            vec![LogicOp::Or],
        )
        .unwrap();
        assert!(!filter.is_conjunctive());
        assert!(Filter::all().is_conjunctive());
    }
}
