//! Rewrite passes over RAM programs.
//!
//! Every pass is a pure function from a program to a program plus a flag
//! telling whether anything changed. Passes never fail: when a pass finds
//! nothing to rewrite it returns its input untouched.

mod collapse_filters;
mod create_indices;
mod existence_checks;
mod expand_filter;
mod hoist_aggregate;
mod if_conversion;
mod reorder_delta;

pub use collapse_filters::CollapseFilters;
pub use create_indices::CreateIndices;
pub use existence_checks::ConvertExistenceChecks;
pub use expand_filter::ExpandFilter;
pub use hoist_aggregate::HoistAggregate;
pub use if_conversion::IfConversion;
pub use reorder_delta::ReorderDelta;

use ram_ir::{Expression, Operation, Program};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Result of running a pass.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub program: Program,
    pub changed: bool,
}

impl Transformed {
    pub fn yes(program: Program) -> Self {
        Transformed {
            program,
            changed: true,
        }
    }

    pub fn no(program: Program) -> Self {
        Transformed {
            program,
            changed: false,
        }
    }
}

/// A semantics-preserving rewrite of a whole program.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    fn transform(&self, program: Program) -> Transformed;
}

/// Run passes once each, in order.
pub struct TransformerSequence {
    passes: Vec<Box<dyn Transformer>>,
}

impl TransformerSequence {
    pub fn new(passes: Vec<Box<dyn Transformer>>) -> Self {
        TransformerSequence { passes }
    }
}

impl Transformer for TransformerSequence {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn transform(&self, program: Program) -> Transformed {
        let mut current = program;
        let mut changed = false;
        for pass in &self.passes {
            let result = pass.transform(current);
            if result.changed {
                debug!(pass = pass.name(), "pass changed program");
            }
            changed |= result.changed;
            current = result.program;
        }
        Transformed {
            program: current,
            changed,
        }
    }
}

/// Repeat a pass until it stops changing the program.
pub struct FixpointTransformer {
    inner: Box<dyn Transformer>,
    max_iterations: usize,
}

impl FixpointTransformer {
    pub fn new(inner: Box<dyn Transformer>, max_iterations: usize) -> Self {
        FixpointTransformer {
            inner,
            max_iterations,
        }
    }
}

impl Transformer for FixpointTransformer {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn transform(&self, program: Program) -> Transformed {
        let mut current = program;
        let mut changed = false;
        for iteration in 1..=self.max_iterations {
            let result = self.inner.transform(current);
            current = result.program;
            if !result.changed {
                debug!(pass = self.inner.name(), iteration, "reached fixpoint");
                return Transformed {
                    program: current,
                    changed,
                };
            }
            changed = true;
        }
        debug!(
            pass = self.inner.name(),
            max_iterations = self.max_iterations,
            "stopped at iteration limit"
        );
        Transformed {
            program: current,
            changed,
        }
    }
}

/// Apply a per-query rewrite that reports whether it changed anything.
pub(crate) fn rewrite_queries(
    program: Program,
    mut rewrite: impl FnMut(Operation) -> (Operation, bool),
) -> Transformed {
    let mut changed = false;
    let program = program.map_queries(|op| {
        let (op, c) = rewrite(op);
        changed |= c;
        op
    });
    Transformed { program, changed }
}

/// Apply `rule` to every operation of every query, bottom-up.
///
/// `rule` returns `Ok(rewritten)` when it applies and gives the operation
/// back through `Err` otherwise.
pub(crate) fn rewrite_operations(
    program: Program,
    mut rule: impl FnMut(Operation) -> Result<Operation, Operation>,
) -> Transformed {
    rewrite_queries(program, |root| {
        let mut changed = false;
        let op = root.rewrite(&mut |op| match rule(op) {
            Ok(rewritten) => {
                changed = true;
                rewritten
            }
            Err(unchanged) => unchanged,
        });
        (op, changed)
    })
}

/// Declared arity of every relation.
pub(crate) fn arities(program: &Program) -> FxHashMap<String, usize> {
    program
        .relations
        .iter()
        .map(|decl| (decl.name.clone(), decl.arity))
        .collect()
}

/// True if evaluating the subtree draws from the auto-increment counter.
///
/// Such subtrees observe how often they run, so passes that change
/// evaluation counts must leave them alone.
pub(crate) fn draws_counter(op: &Operation) -> bool {
    let mut found = false;
    op.for_each_expression(&mut |e| found |= matches!(e, Expression::AutoIncrement));
    found
}

pub(crate) fn expression_draws_counter(expr: &Expression) -> bool {
    let mut found = false;
    expr.walk(&mut |e| found |= matches!(e, Expression::AutoIncrement));
    found
}
