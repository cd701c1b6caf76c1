//! Mark scans whose tuple is never read.

use ram_ir::{Operation, Program};

use super::{Transformed, Transformer, arities, draws_counter, rewrite_operations};

/// Flags a `Scan`/`IndexScan` as a pure existence test when nothing nested
/// in it reads the bound tuple, so the executor can stop at the first match.
///
/// Nullary relations are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertExistenceChecks;

impl Transformer for ConvertExistenceChecks {
    fn name(&self) -> &'static str {
        "convert_existence_checks"
    }

    fn transform(&self, program: Program) -> Transformed {
        let arities = arities(&program);
        let nullary = |relation: &str| arities.get(relation).is_none_or(|a| *a == 0);
        rewrite_operations(program, |op| match op {
            Operation::Scan(mut scan)
                if !scan.pure_existence
                    && !nullary(&scan.relation)
                    && !scan.nested.references_tuple(scan.tuple_id)
                    && !draws_counter(&scan.nested) =>
            {
                scan.pure_existence = true;
                Ok(Operation::Scan(scan))
            }
            Operation::IndexScan(mut scan)
                if !scan.pure_existence
                    && !nullary(&scan.relation)
                    && !scan.nested.references_tuple(scan.tuple_id)
                    && !draws_counter(&scan.nested) =>
            {
                scan.pure_existence = true;
                Ok(Operation::IndexScan(scan))
            }
            other => Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::test_support::{only_query, program_with};
    use ram_ir::{Expression, Pattern};

    #[test]
    fn test_unused_tuple_becomes_existence_check() {
        let program = program_with(
            &[("a", 1), ("b", 2), ("out", 1)],
            Operation::scan(
                "a",
                0,
                Operation::index_scan(
                    "b",
                    1,
                    Pattern(vec![Some(Expression::element(0, 0)), None]),
                    Operation::project("out", vec![Expression::element(0, 0)]),
                ),
            ),
        );
        let result = ConvertExistenceChecks.transform(program);
        assert!(result.changed);
        let Operation::Scan(outer) = only_query(&result.program) else {
            panic!("outer scan kept");
        };
        assert!(!outer.pure_existence);
        let Operation::IndexScan(inner) = &*outer.nested else {
            panic!("inner index scan kept");
        };
        assert!(inner.pure_existence);
    }

    #[test]
    fn test_nullary_and_counter_draws_are_kept() {
        let program = program_with(
            &[("flag", 0), ("r", 1), ("out", 1)],
            Operation::scan(
                "flag",
                0,
                Operation::scan(
                    "r",
                    1,
                    Operation::project("out", vec![Expression::AutoIncrement]),
                ),
            ),
        );
        assert!(!ConvertExistenceChecks.transform(program).changed);
    }
}
