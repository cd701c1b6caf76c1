//! Move aggregates out of loops they do not depend on.

use ram_ir::{Condition, Expression, IntrinsicOp, Operation, Program, fatal};

use super::{Transformed, Transformer, rewrite_operations};
use crate::level::LevelAnalysis;

/// Bubbles an aggregate above a tuple operation binding `t` when the
/// aggregate's level is below `t`, and above any filter. Repeats until no
/// aggregate can move.
///
/// A hoisted aggregate runs even where the filter it passed would have
/// failed, so one that divides stays below its filters: the filter may be
/// what keeps the divisor non-zero.
///
/// Aggregates never move past each other, which keeps the rewrite finite.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoistAggregate {
    levels: LevelAnalysis,
}

impl HoistAggregate {
    pub fn new() -> Self {
        HoistAggregate::default()
    }

    fn can_hoist(&self, op: &Operation) -> bool {
        let Some(nested) = op.nested() else {
            return false;
        };
        if !matches!(
            nested,
            Operation::Aggregate(_) | Operation::IndexAggregate(_)
        ) {
            return false;
        }
        match op {
            Operation::Scan(_)
            | Operation::IndexScan(_)
            | Operation::Choice(_)
            | Operation::IndexChoice(_)
            | Operation::UnpackRecord(_) => self.levels.operation(nested) < op.tuple_id(),
            Operation::Filter { .. } => !divides(nested),
            _ => false,
        }
    }
}

fn divides(aggregate: &Operation) -> bool {
    let (expression, condition) = match aggregate {
        Operation::Aggregate(agg) => (&agg.expression, &agg.condition),
        Operation::IndexAggregate(agg) => (&agg.expression, &agg.condition),
        _ => return false,
    };
    let mut found = false;
    let mut check = |e: &Expression| {
        found |= matches!(
            e,
            Expression::Intrinsic {
                op: IntrinsicOp::Div | IntrinsicOp::Mod,
                ..
            }
        );
    };
    expression.walk(&mut check);
    condition.for_each_expression(&mut check);
    found
}

impl Transformer for HoistAggregate {
    fn name(&self) -> &'static str {
        "hoist_aggregate"
    }

    fn transform(&self, program: Program) -> Transformed {
        let mut current = program;
        let mut changed = false;
        loop {
            let sweep = rewrite_operations(current, |op| {
                if self.can_hoist(&op) {
                    Ok(swap_with_nested(op))
                } else {
                    Err(op)
                }
            });
            current = sweep.program;
            if !sweep.changed {
                return Transformed {
                    program: current,
                    changed,
                };
            }
            changed = true;
        }
    }
}

/// `P{C{rest}}` → `C{P{rest}}`.
fn swap_with_nested(mut parent: Operation) -> Operation {
    let placeholder = || Operation::SubroutineReturn(Vec::new());
    let Some(mut child) = parent
        .nested_mut()
        .map(|slot| std::mem::replace(slot.as_mut(), placeholder()))
    else {
        fatal!("cannot hoist past a leaf operation");
    };
    match (parent.nested_mut(), child.nested_mut()) {
        (Some(outer), Some(inner)) => std::mem::swap(outer, inner),
        _ => fatal!("cannot hoist a leaf operation"),
    }
    if let Some(slot) = child.nested_mut() {
        **slot = parent;
    }
    child
}
