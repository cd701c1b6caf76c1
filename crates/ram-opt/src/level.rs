//! Level analysis.
//!
//! The level of a node is the deepest tuple identifier it reads, i.e. the
//! innermost loop that must already be bound before the node can be
//! evaluated. `None` means the node reads no tuple and can run at the top of
//! a query. `Option`'s ordering puts `None` below every `Some`, so the level
//! of a compound node is simply the maximum over its parts.

use ram_ir::{Condition, Expression, NodeRef, Operation, Pattern, fatal};

/// Deepest tuple identifier a node depends on, `None` for none.
pub type Level = Option<usize>;

/// Computes levels of RAM nodes.
///
/// The analysis is stateless; the struct exists so passes can hold it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelAnalysis;

impl LevelAnalysis {
    pub fn new() -> Self {
        LevelAnalysis
    }

    /// Level of any node. Statements have no level.
    pub fn level<'a>(&self, node: impl Into<NodeRef<'a>>) -> Level {
        match node.into() {
            NodeRef::Expression(e) => self.expression(e),
            NodeRef::Condition(c) => self.condition(c),
            NodeRef::Operation(o) => self.operation(o),
            NodeRef::Statement(s) => {
                fatal!("level analysis is undefined for {:?} statements", s.kind())
            }
        }
    }

    pub fn expression(&self, expr: &Expression) -> Level {
        self.expression_excluding(expr, None)
    }

    pub fn condition(&self, condition: &Condition) -> Level {
        self.condition_excluding(condition, None)
    }

    pub fn pattern(&self, pattern: &Pattern) -> Level {
        self.pattern_excluding(pattern, None)
    }

    /// Level of the node itself, not of the operations nested in it.
    ///
    /// Aggregates bind their own identifier while folding, so references to
    /// it inside the aggregate do not count.
    pub fn operation(&self, op: &Operation) -> Level {
        match op {
            Operation::Scan(_) => None,
            Operation::IndexScan(s) => self.pattern(&s.pattern),
            Operation::Choice(c) => self.condition_excluding(&c.condition, Some(c.tuple_id)),
            Operation::IndexChoice(c) => self
                .pattern(&c.pattern)
                .max(self.condition_excluding(&c.condition, Some(c.tuple_id))),
            Operation::Aggregate(a) => {
                let own = Some(a.tuple_id);
                self.expression_excluding(&a.expression, own)
                    .max(self.condition_excluding(&a.condition, own))
            }
            Operation::IndexAggregate(a) => {
                let own = Some(a.tuple_id);
                self.pattern_excluding(&a.pattern, own)
                    .max(self.expression_excluding(&a.expression, own))
                    .max(self.condition_excluding(&a.condition, own))
            }
            Operation::UnpackRecord(u) => self.expression(&u.expression),
            Operation::Filter { condition, .. } | Operation::Break { condition, .. } => {
                self.condition(condition)
            }
            Operation::Project { values, .. } | Operation::SubroutineReturn(values) => {
                self.max_over(values, None)
            }
        }
    }

    fn max_over(&self, exprs: &[Expression], excluded: Option<usize>) -> Level {
        exprs
            .iter()
            .map(|e| self.expression_excluding(e, excluded))
            .max()
            .flatten()
    }

    fn expression_excluding(&self, expr: &Expression, excluded: Option<usize>) -> Level {
        match expr {
            Expression::Constant(_)
            | Expression::StringConstant(_)
            | Expression::AutoIncrement
            | Expression::UndefValue
            | Expression::SubroutineArgument(_)
            | Expression::RelationSize(_) => None,
            Expression::TupleElement { tuple_id, .. } => {
                if excluded == Some(*tuple_id) {
                    None
                } else {
                    Some(*tuple_id)
                }
            }
            Expression::Intrinsic { args, .. } | Expression::PackRecord(args) => {
                self.max_over(args, excluded)
            }
        }
    }

    fn pattern_excluding(&self, pattern: &Pattern, excluded: Option<usize>) -> Level {
        pattern
            .bound()
            .map(|(_, e)| self.expression_excluding(e, excluded))
            .max()
            .flatten()
    }

    fn condition_excluding(&self, condition: &Condition, excluded: Option<usize>) -> Level {
        match condition {
            Condition::True | Condition::False | Condition::EmptinessCheck(_) => None,
            Condition::Conjunction(lhs, rhs) => self
                .condition_excluding(lhs, excluded)
                .max(self.condition_excluding(rhs, excluded)),
            Condition::Negation(inner) => self.condition_excluding(inner, excluded),
            Condition::Constraint { lhs, rhs, .. } => self
                .expression_excluding(lhs, excluded)
                .max(self.expression_excluding(rhs, excluded)),
            Condition::ExistenceCheck { pattern, .. }
            | Condition::ProvenanceExistenceCheck { pattern, .. } => {
                self.pattern_excluding(pattern, excluded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ram_ir::{AggregateOp, IntrinsicOp, Statement};

    #[test]
    fn test_constants_have_no_level() {
        let la = LevelAnalysis::new();
        let expr = Expression::intrinsic(
            IntrinsicOp::Add,
            vec![
                Expression::constant(1),
                Expression::AutoIncrement,
                Expression::UndefValue,
            ],
        );
        assert_eq!(la.expression(&expr), None);
        assert_eq!(la.condition(&Condition::empty("r")), None);
    }

    #[test]
    fn test_tuple_element_level() {
        let la = LevelAnalysis::new();
        assert_eq!(la.expression(&Expression::element(3, 1)), Some(3));
    }

    #[test]
    fn test_constraint_takes_max() {
        let la = LevelAnalysis::new();
        let c = Condition::and(
            Condition::equal(Expression::element(0, 0), Expression::element(2, 1)),
            Condition::negate(Condition::exists(
                "r",
                Pattern(vec![None, Some(Expression::element(1, 0))]),
            )),
        );
        assert_eq!(la.condition(&c), Some(2));
    }

    #[test]
    fn test_aggregate_ignores_own_tuple() {
        let la = LevelAnalysis::new();
        let agg = Operation::aggregate(
            "r",
            4,
            AggregateOp::Sum,
            Expression::element(4, 0),
            Condition::equal(Expression::element(4, 1), Expression::element(1, 0)),
            Operation::project("out", vec![Expression::element(4, 0)]),
        );
        assert_eq!(la.operation(&agg), Some(1));
    }

    #[test]
    fn test_filter_level_excludes_nested() {
        let la = LevelAnalysis::new();
        let op = Operation::filter(
            Condition::equal(Expression::element(0, 0), Expression::constant(1)),
            Operation::project("out", vec![Expression::element(5, 0)]),
        );
        assert_eq!(la.operation(&op), Some(0));
    }

    #[test]
    #[should_panic(expected = "undefined for Clear statements")]
    fn test_statement_level_is_fatal() {
        let la = LevelAnalysis::new();
        la.level(&Statement::clear("r"));
    }
}
