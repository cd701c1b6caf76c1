//! Turn equality filters on a scanned tuple into range patterns.
//!
//! A conjunct `t.c = e` (or `e = t.c`) directly under the operation binding
//! `t` can be answered by an index when `e` is already known before the
//! operation runs: `e` is a constant or only reads tuples bound further out.
//! Such conjuncts move into the operation's pattern; the rest stay behind as
//! a single residual filter.

use ram_ir::{
    Condition, ConstraintOp, Expression, IndexAggregate, IndexChoice, IndexScan, NumericKind,
    Operation, Pattern, Program, fatal,
};
use rustc_hash::FxHashMap;

use super::{Transformed, Transformer, arities, expression_draws_counter, rewrite_operations};
use crate::level::LevelAnalysis;

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateIndices {
    levels: LevelAnalysis,
}

impl CreateIndices {
    pub fn new() -> Self {
        CreateIndices::default()
    }
}

impl Transformer for CreateIndices {
    fn name(&self) -> &'static str {
        "create_indices"
    }

    fn transform(&self, program: Program) -> Transformed {
        let arities = arities(&program);
        rewrite_operations(program, |op| self.index(op, &arities))
    }
}

/// Which side of an equality holds the known value.
#[derive(Debug, Clone, Copy)]
enum ValueSide {
    Lhs,
    Rhs,
}

impl CreateIndices {
    fn index(
        &self,
        op: Operation,
        arities: &FxHashMap<String, usize>,
    ) -> Result<Operation, Operation> {
        match op {
            Operation::Scan(scan) => {
                let pattern = Pattern::wildcard(arity_of(arities, &scan.relation));
                if !self.chain_extends(&scan.nested, scan.tuple_id, &pattern) {
                    return Err(Operation::Scan(scan));
                }
                let (pattern, nested) = self.absorb_chain(pattern, *scan.nested, scan.tuple_id);
                Ok(Operation::IndexScan(IndexScan {
                    relation: scan.relation,
                    tuple_id: scan.tuple_id,
                    pattern,
                    nested: Box::new(nested),
                    pure_existence: scan.pure_existence,
                }))
            }
            Operation::IndexScan(mut scan) => {
                if !self.chain_extends(&scan.nested, scan.tuple_id, &scan.pattern) {
                    return Err(Operation::IndexScan(scan));
                }
                let pattern = std::mem::take(&mut scan.pattern);
                let (pattern, nested) = self.absorb_chain(pattern, *scan.nested, scan.tuple_id);
                scan.pattern = pattern;
                scan.nested = Box::new(nested);
                Ok(Operation::IndexScan(scan))
            }
            Operation::Choice(choice) => {
                let mut pattern = Pattern::wildcard(arity_of(arities, &choice.relation));
                if !self.extends(conjunct_refs(&choice.condition), choice.tuple_id, &pattern) {
                    return Err(Operation::Choice(choice));
                }
                let residual =
                    self.absorb(&mut pattern, choice.condition.conjuncts(), choice.tuple_id);
                Ok(Operation::IndexChoice(IndexChoice {
                    relation: choice.relation,
                    tuple_id: choice.tuple_id,
                    pattern,
                    condition: Condition::conjoin(residual),
                    nested: choice.nested,
                }))
            }
            Operation::IndexChoice(mut choice) => {
                if !self.extends(conjunct_refs(&choice.condition), choice.tuple_id, &choice.pattern)
                {
                    return Err(Operation::IndexChoice(choice));
                }
                let condition = std::mem::replace(&mut choice.condition, Condition::True);
                let residual = self.absorb(&mut choice.pattern, condition.conjuncts(), choice.tuple_id);
                choice.condition = Condition::conjoin(residual);
                Ok(Operation::IndexChoice(choice))
            }
            Operation::Aggregate(agg) => {
                let mut pattern = Pattern::wildcard(arity_of(arities, &agg.relation));
                if !self.extends(conjunct_refs(&agg.condition), agg.tuple_id, &pattern) {
                    return Err(Operation::Aggregate(agg));
                }
                let residual = self.absorb(&mut pattern, agg.condition.conjuncts(), agg.tuple_id);
                Ok(Operation::IndexAggregate(IndexAggregate {
                    relation: agg.relation,
                    tuple_id: agg.tuple_id,
                    pattern,
                    function: agg.function,
                    kind: agg.kind,
                    expression: agg.expression,
                    condition: Condition::conjoin(residual),
                    nested: agg.nested,
                }))
            }
            Operation::IndexAggregate(mut agg) => {
                if !self.extends(conjunct_refs(&agg.condition), agg.tuple_id, &agg.pattern) {
                    return Err(Operation::IndexAggregate(agg));
                }
                let condition = std::mem::replace(&mut agg.condition, Condition::True);
                let residual = self.absorb(&mut agg.pattern, condition.conjuncts(), agg.tuple_id);
                agg.condition = Condition::conjoin(residual);
                Ok(Operation::IndexAggregate(agg))
            }
            other => Err(other),
        }
    }

    /// Would the filter chain starting at `nested` bind a new column?
    fn chain_extends(&self, nested: &Operation, tuple_id: usize, pattern: &Pattern) -> bool {
        let mut conditions = Vec::new();
        let mut current = nested;
        while let Operation::Filter { condition, nested } = current {
            conditions.extend(conjunct_refs(condition));
            current = nested;
        }
        self.extends(conditions, tuple_id, pattern)
    }

    fn extends<'a>(
        &self,
        conditions: impl IntoIterator<Item = &'a Condition>,
        tuple_id: usize,
        pattern: &Pattern,
    ) -> bool {
        conditions.into_iter().any(|c| {
            self.index_column(c, tuple_id)
                .is_some_and(|(column, _)| column < pattern.arity() && !pattern.is_bound(column))
        })
    }

    /// Strip the filter chain under a scan, absorbing what the pattern can
    /// answer and re-wrapping the rest in one filter.
    fn absorb_chain(
        &self,
        mut pattern: Pattern,
        nested: Operation,
        tuple_id: usize,
    ) -> (Pattern, Operation) {
        let mut conditions = Vec::new();
        let mut body = nested;
        loop {
            match body {
                Operation::Filter { condition, nested } => {
                    conditions.extend(condition.conjuncts());
                    body = *nested;
                }
                other => {
                    body = other;
                    break;
                }
            }
        }
        let residual = self.absorb(&mut pattern, conditions, tuple_id);
        let body = if residual.is_empty() {
            body
        } else {
            Operation::filter(Condition::conjoin(residual), body)
        };
        (pattern, body)
    }

    /// Move indexable conjuncts into `pattern`; the first binding of a column
    /// wins. Returns the conjuncts left over, in order.
    fn absorb(
        &self,
        pattern: &mut Pattern,
        conditions: Vec<Condition>,
        tuple_id: usize,
    ) -> Vec<Condition> {
        let mut residual = Vec::new();
        for condition in conditions {
            match self.index_column(&condition, tuple_id) {
                Some((column, side)) if column < pattern.arity() && !pattern.is_bound(column) => {
                    pattern.bind(column, known_value(condition, side));
                }
                _ => residual.push(condition),
            }
        }
        residual
    }

    /// The column of `tuple_id` an equality conjunct pins to a known value.
    fn index_column(&self, condition: &Condition, tuple_id: usize) -> Option<(usize, ValueSide)> {
        let Condition::Constraint {
            op: ConstraintOp::Eq,
            kind,
            lhs,
            rhs,
        } = condition
        else {
            return None;
        };
        // float equality is not representation equality
        if *kind == NumericKind::Float {
            return None;
        }
        self.pinned(lhs, rhs, tuple_id)
            .map(|c| (c, ValueSide::Rhs))
            .or_else(|| self.pinned(rhs, lhs, tuple_id).map(|c| (c, ValueSide::Lhs)))
    }

    fn pinned(&self, column: &Expression, value: &Expression, tuple_id: usize) -> Option<usize> {
        match column {
            Expression::TupleElement {
                tuple_id: t,
                element,
            } if *t == tuple_id && self.is_known(value, tuple_id) => Some(*element),
            _ => None,
        }
    }

    fn is_known(&self, value: &Expression, tuple_id: usize) -> bool {
        !expression_draws_counter(value)
            && (value.is_constant() || self.levels.expression(value) < Some(tuple_id))
    }
}

fn conjunct_refs(condition: &Condition) -> Vec<&Condition> {
    let mut out = Vec::new();
    let mut stack = vec![condition];
    while let Some(c) = stack.pop() {
        match c {
            Condition::Conjunction(lhs, rhs) => {
                stack.push(rhs);
                stack.push(lhs);
            }
            other => out.push(other),
        }
    }
    out
}

fn known_value(condition: Condition, side: ValueSide) -> Expression {
    let Condition::Constraint { lhs, rhs, .. } = condition else {
        fatal!("indexed conjunct is not a constraint: {condition}");
    };
    match side {
        ValueSide::Lhs => *lhs,
        ValueSide::Rhs => *rhs,
    }
}

fn arity_of(arities: &FxHashMap<String, usize>, relation: &str) -> usize {
    match arities.get(relation) {
        Some(arity) => *arity,
        None => fatal!("relation `{relation}` is not declared"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::test_support::{only_query, program_with};
    use ram_ir::AggregateOp;

    fn eq(lhs: Expression, rhs: Expression) -> Condition {
        Condition::equal(lhs, rhs)
    }

    #[test]
    fn test_constant_equality_becomes_pattern() {
        let body = Operation::project("out", vec![Expression::element(0, 1)]);
        let residual = eq(Expression::element(0, 1), Expression::element(0, 0));
        let program = program_with(
            &[("edge", 2), ("out", 1)],
            Operation::scan(
                "edge",
                0,
                Operation::filter(
                    Condition::and(eq(Expression::element(0, 0), Expression::constant(1)), residual.clone()),
                    body.clone(),
                ),
            ),
        );
        let result = CreateIndices::new().transform(program);
        assert!(result.changed);
        let expected = Operation::index_scan(
            "edge",
            0,
            Pattern(vec![Some(Expression::constant(1)), None]),
            Operation::filter(residual, body),
        );
        assert_eq!(only_query(&result.program), &expected);
    }

    #[test]
    fn test_join_condition_on_outer_tuple() {
        let body = Operation::project(
            "out",
            vec![Expression::element(0, 0), Expression::element(1, 1)],
        );
        let program = program_with(
            &[("edge", 2), ("out", 2)],
            Operation::scan(
                "edge",
                0,
                Operation::scan(
                    "edge",
                    1,
                    // written mirrored: outer column on the left
                    Operation::filter(
                        eq(Expression::element(0, 1), Expression::element(1, 0)),
                        body.clone(),
                    ),
                ),
            ),
        );
        let result = CreateIndices::new().transform(program);
        let expected = Operation::scan(
            "edge",
            0,
            Operation::index_scan(
                "edge",
                1,
                Pattern(vec![Some(Expression::element(0, 1)), None]),
                body,
            ),
        );
        assert_eq!(only_query(&result.program), &expected);
    }

    #[test]
    fn test_first_binding_of_column_wins() {
        let body = Operation::project("out", vec![Expression::element(0, 1)]);
        let second = eq(Expression::element(0, 0), Expression::constant(2));
        let program = program_with(
            &[("edge", 2), ("out", 1)],
            Operation::scan(
                "edge",
                0,
                Operation::filter(
                    eq(Expression::element(0, 0), Expression::constant(1)),
                    Operation::filter(second.clone(), body.clone()),
                ),
            ),
        );
        let result = CreateIndices::new().transform(program);
        let expected = Operation::index_scan(
            "edge",
            0,
            Pattern(vec![Some(Expression::constant(1)), None]),
            Operation::filter(second, body),
        );
        assert_eq!(only_query(&result.program), &expected);
    }

    #[test]
    fn test_float_equality_is_not_indexed() {
        let program = program_with(
            &[("r", 1), ("out", 1)],
            Operation::scan(
                "r",
                0,
                Operation::filter(
                    Condition::Constraint {
                        op: ConstraintOp::Eq,
                        kind: NumericKind::Float,
                        lhs: Box::new(Expression::element(0, 0)),
                        rhs: Box::new(Expression::float(1.5)),
                    },
                    Operation::project("out", vec![Expression::element(0, 0)]),
                ),
            ),
        );
        assert!(!CreateIndices::new().transform(program).changed);
    }

    #[test]
    fn test_aggregate_condition_becomes_pattern() {
        let nested = Operation::project(
            "out",
            vec![Expression::element(0, 0), Expression::element(1, 0)],
        );
        let program = program_with(
            &[("node", 1), ("edge", 2), ("out", 2)],
            Operation::scan(
                "node",
                0,
                Operation::aggregate(
                    "edge",
                    1,
                    AggregateOp::Count,
                    Expression::UndefValue,
                    eq(Expression::element(1, 0), Expression::element(0, 0)),
                    nested.clone(),
                ),
            ),
        );
        let result = CreateIndices::new().transform(program);
        let Operation::Scan(outer) = only_query(&result.program) else {
            panic!("outer scan rewritten");
        };
        match &*outer.nested {
            Operation::IndexAggregate(agg) => {
                assert_eq!(agg.pattern, Pattern(vec![Some(Expression::element(0, 0)), None]));
                assert_eq!(agg.condition, Condition::True);
                assert_eq!(*agg.nested, nested);
            }
            other => panic!("expected an index aggregate, found {other}"),
        }
    }

    #[test]
    fn test_second_run_is_unchanged() {
        let program = program_with(
            &[("edge", 2), ("out", 1)],
            Operation::scan(
                "edge",
                0,
                Operation::filter(
                    eq(Expression::element(0, 0), Expression::constant(1)),
                    Operation::project("out", vec![Expression::element(0, 1)]),
                ),
            ),
        );
        let once = CreateIndices::new().transform(program);
        assert!(once.changed);
        let twice = CreateIndices::new().transform(once.program.clone());
        assert!(!twice.changed);
        assert_eq!(twice.program, once.program);
    }
}
