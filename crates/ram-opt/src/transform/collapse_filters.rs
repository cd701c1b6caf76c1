//! Merge directly nested filters into one.

use ram_ir::{Condition, Operation, Program};

use super::{Transformed, Transformer, rewrite_operations};

/// `Filter(C1){Filter(C2){op}}` → `Filter(C1 ∧ C2){op}`.
///
/// Operates bottom-up, so a whole chain collapses in one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollapseFilters;

impl Transformer for CollapseFilters {
    fn name(&self) -> &'static str {
        "collapse_filters"
    }

    fn transform(&self, program: Program) -> Transformed {
        rewrite_operations(program, |op| match op {
            Operation::Filter { condition, nested } => match *nested {
                Operation::Filter {
                    condition: inner,
                    nested: body,
                } => {
                    let mut conjuncts = condition.conjuncts();
                    conjuncts.extend(inner.conjuncts());
                    Ok(Operation::Filter {
                        condition: Condition::conjoin(conjuncts),
                        nested: body,
                    })
                }
                other => Err(Operation::filter(condition, other)),
            },
            other => Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::ExpandFilter;
    use crate::transform::test_support::{only_query, program_with};
    use ram_ir::Expression;

    fn c(v: i32) -> Condition {
        Condition::equal(Expression::element(0, 0), Expression::constant(v))
    }

    fn body() -> Operation {
        Operation::project("out", vec![Expression::element(0, 0)])
    }

    #[test]
    fn test_collapses_whole_chain() {
        let program = program_with(
            &[("r", 1), ("out", 1)],
            Operation::scan(
                "r",
                0,
                Operation::filter(c(1), Operation::filter(c(2), Operation::filter(c(3), body()))),
            ),
        );
        let result = CollapseFilters.transform(program);
        assert!(result.changed);
        let expected = Operation::scan(
            "r",
            0,
            Operation::filter(Condition::conjoin(vec![c(1), c(2), c(3)]), body()),
        );
        assert_eq!(only_query(&result.program), &expected);
    }

    #[test]
    fn test_expand_is_inverse_of_collapse() {
        let collapsed = program_with(
            &[("r", 1), ("out", 1)],
            Operation::scan(
                "r",
                0,
                Operation::filter(Condition::conjoin(vec![c(1), c(2), c(3)]), body()),
            ),
        );
        let expanded = ExpandFilter.transform(collapsed.clone()).program;
        let again = CollapseFilters.transform(expanded);
        assert_eq!(again.program, collapsed);
        assert!(!CollapseFilters.transform(again.program).changed);
    }
}
