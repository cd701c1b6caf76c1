//! Make the delta relation of a self-join the outer loop.
//!
//! Semi-naive evaluation produces joins of a relation with its own delta.
//! The delta is usually much smaller, so iterating it outermost and probing
//! the full relation inside does less work.

use ram_ir::{Expression, IndexScan, Operation, Pattern, Program, Scan, delta_base};

use super::{Transformed, Transformer, rewrite_operations};

/// Rewrites
///
/// * `Scan(R, t0){Scan(@delta_R, t1){op}}` into
///   `Scan(@delta_R, t0){Scan(R, t1){op'}}`, and
/// * `Scan(R, t0){IndexScan(@delta_R, t1, p){op}}`, where every bound
///   entry `p[j]` is a distinct bare `t0.c_j`, into
///   `Scan(@delta_R, t0){IndexScan(R, t1, p'){op'}}` with `p'[c_j] = t0.j`,
///
/// where `op'` is `op` with `t0` and `t1` exchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReorderDelta;

impl Transformer for ReorderDelta {
    fn name(&self) -> &'static str {
        "reorder_delta"
    }

    fn transform(&self, program: Program) -> Transformed {
        rewrite_operations(program, |op| match op {
            Operation::Scan(outer) if !outer.pure_existence => reorder(outer),
            other => Err(other),
        })
    }
}

fn reorder(outer: Scan) -> Result<Operation, Operation> {
    let t0 = outer.tuple_id;
    match *outer.nested {
        Operation::Scan(inner)
            if !inner.pure_existence && is_delta_of(&inner.relation, &outer.relation) =>
        {
            let t1 = inner.tuple_id;
            Ok(Operation::Scan(Scan {
                relation: inner.relation,
                tuple_id: t0,
                pure_existence: false,
                nested: Box::new(Operation::Scan(Scan {
                    relation: outer.relation,
                    tuple_id: t1,
                    pure_existence: false,
                    nested: Box::new(exchange(*inner.nested, t0, t1)),
                })),
            }))
        }
        Operation::IndexScan(inner)
            if !inner.pure_existence && is_delta_of(&inner.relation, &outer.relation) =>
        {
            let Some(columns) = outer_columns(&inner.pattern, t0) else {
                return Err(Operation::Scan(Scan {
                    nested: Box::new(Operation::IndexScan(inner)),
                    ..outer
                }));
            };
            let t1 = inner.tuple_id;
            let mut pattern = Pattern::wildcard(inner.pattern.arity());
            for (j, c) in columns {
                pattern.bind(c, Expression::element(t0, j));
            }
            Ok(Operation::Scan(Scan {
                relation: inner.relation,
                tuple_id: t0,
                pure_existence: false,
                nested: Box::new(Operation::IndexScan(IndexScan {
                    relation: outer.relation,
                    tuple_id: t1,
                    pattern,
                    pure_existence: false,
                    nested: Box::new(exchange(*inner.nested, t0, t1)),
                })),
            }))
        }
        nested => Err(Operation::Scan(Scan {
            nested: Box::new(nested),
            ..outer
        })),
    }
}

fn is_delta_of(candidate: &str, relation: &str) -> bool {
    delta_base(candidate) == Some(relation)
}

/// `(j, c_j)` for every bound entry when each is a distinct bare `t0.c_j`.
fn outer_columns(pattern: &Pattern, t0: usize) -> Option<Vec<(usize, usize)>> {
    let mut columns = Vec::new();
    for (j, entry) in pattern.bound() {
        match entry {
            Expression::TupleElement { tuple_id, element }
                if *tuple_id == t0
                    && *element < pattern.arity()
                    && !columns.iter().any(|(_, c)| c == element) =>
            {
                columns.push((j, *element));
            }
            _ => return None,
        }
    }
    Some(columns)
}

fn exchange(op: Operation, t0: usize, t1: usize) -> Operation {
    op.rename_tuples(&|t| {
        if t == t0 {
            t1
        } else if t == t1 {
            t0
        } else {
            t
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::test_support::{only_query, program_with};
    use ram_ir::Condition;

    const RELATIONS: &[(&str, usize)] = &[("path", 2), ("@delta_path", 2), ("@new_path", 2)];

    fn derive(a: Expression, b: Expression) -> Operation {
        Operation::filter(
            Condition::negate(Condition::exists(
                "path",
                Pattern::total(vec![a.clone(), b.clone()]),
            )),
            Operation::project("@new_path", vec![a, b]),
        )
    }

    #[test]
    fn test_delta_moves_outside_index_scan() {
        // path(x, z) :- path(x, y), @delta_path(y, z).
        let program = program_with(
            RELATIONS,
            Operation::scan(
                "path",
                0,
                Operation::index_scan(
                    "@delta_path",
                    1,
                    Pattern(vec![Some(Expression::element(0, 1)), None]),
                    derive(Expression::element(0, 0), Expression::element(1, 1)),
                ),
            ),
        );
        let result = ReorderDelta.transform(program);
        assert!(result.changed);
        let expected = Operation::scan(
            "@delta_path",
            0,
            Operation::index_scan(
                "path",
                1,
                Pattern(vec![None, Some(Expression::element(0, 0))]),
                derive(Expression::element(1, 0), Expression::element(0, 1)),
            ),
        );
        assert_eq!(only_query(&result.program), &expected);
    }

    #[test]
    fn test_delta_moves_outside_scan() {
        let program = program_with(
            RELATIONS,
            Operation::scan(
                "path",
                0,
                Operation::scan(
                    "@delta_path",
                    1,
                    derive(Expression::element(0, 0), Expression::element(1, 1)),
                ),
            ),
        );
        let expected = Operation::scan(
            "@delta_path",
            0,
            Operation::scan(
                "path",
                1,
                derive(Expression::element(1, 0), Expression::element(0, 1)),
            ),
        );
        assert_eq!(only_query(&ReorderDelta.transform(program).program), &expected);
    }

    #[test]
    fn test_computed_pattern_entries_block_reordering() {
        let program = program_with(
            RELATIONS,
            Operation::scan(
                "path",
                0,
                Operation::index_scan(
                    "@delta_path",
                    1,
                    Pattern(vec![Some(Expression::constant(4)), None]),
                    derive(Expression::element(0, 0), Expression::element(1, 1)),
                ),
            ),
        );
        assert!(!ReorderDelta.transform(program).changed);
    }

    #[test]
    fn test_unrelated_relations_untouched() {
        let program = program_with(
            &[("edge", 2), ("@delta_path", 2), ("@new_path", 2), ("path", 2)],
            Operation::scan(
                "edge",
                0,
                Operation::scan(
                    "@delta_path",
                    1,
                    derive(Expression::element(0, 0), Expression::element(1, 1)),
                ),
            ),
        );
        assert!(!ReorderDelta.transform(program).changed);
    }
}
