//! Split conjunctive filters into a chain of single-condition filters.

use ram_ir::{Condition, Operation, Program};

use super::{Transformed, Transformer, rewrite_operations};

/// `Filter(C1 ∧ .. ∧ Cn){op}` → `Filter(C1){ .. Filter(Cn){op} }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandFilter;

impl Transformer for ExpandFilter {
    fn name(&self) -> &'static str {
        "expand_filter"
    }

    fn transform(&self, program: Program) -> Transformed {
        rewrite_operations(program, |op| match op {
            Operation::Filter {
                condition: condition @ Condition::Conjunction(..),
                nested,
            } => {
                let conjuncts = condition.conjuncts();
                Ok(conjuncts
                    .into_iter()
                    .rev()
                    .fold(*nested, |inner, c| Operation::filter(c, inner)))
            }
            other => Err(other),
        })
    }
}
