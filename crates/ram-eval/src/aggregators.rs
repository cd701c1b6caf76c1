//! Built-in aggregators for the interpreter.
//!
//! Each aggregator folds the values an aggregate collected from its matching
//! tuples into a single result, or into nothing when the fold has no
//! identity and no values were collected.

use ram_ir::types::{from_float, from_unsigned, to_float, to_unsigned};
use ram_ir::{AggregateOp, NumericKind, RamDomain, RamFloat};

use crate::expr::compare_values;

/// Fold `values` with `function`, reading them as `kind`.
pub fn apply_aggregator(
    function: AggregateOp,
    kind: NumericKind,
    values: &[RamDomain],
) -> Option<RamDomain> {
    match function {
        AggregateOp::Min => agg_min(kind, values),
        AggregateOp::Max => agg_max(kind, values),
        AggregateOp::Count => Some(agg_count(values)),
        AggregateOp::Sum => Some(agg_sum(kind, values)),
        AggregateOp::Mean => agg_mean(kind, values),
    }
}

/// `min(x)` - returns the minimum value.
fn agg_min(kind: NumericKind, values: &[RamDomain]) -> Option<RamDomain> {
    values
        .iter()
        .copied()
        .reduce(|a, b| if compare_values(kind, b, a).is_lt() { b } else { a })
}

/// `max(x)` - returns the maximum value.
fn agg_max(kind: NumericKind, values: &[RamDomain]) -> Option<RamDomain> {
    values
        .iter()
        .copied()
        .reduce(|a, b| if compare_values(kind, b, a).is_gt() { b } else { a })
}

/// `count` - returns the number of matching tuples.
fn agg_count(values: &[RamDomain]) -> RamDomain {
    values.len() as RamDomain
}

/// `sum(x)` - returns the sum, wrapping on integer overflow.
fn agg_sum(kind: NumericKind, values: &[RamDomain]) -> RamDomain {
    match kind {
        NumericKind::Signed => values.iter().fold(0, |acc: RamDomain, v| acc.wrapping_add(*v)),
        NumericKind::Unsigned => from_unsigned(
            values
                .iter()
                .fold(0u32, |acc, v| acc.wrapping_add(to_unsigned(*v))),
        ),
        NumericKind::Float => from_float(values.iter().map(|v| to_float(*v)).sum()),
    }
}

/// `mean(x)` - returns the arithmetic mean as a float.
fn agg_mean(kind: NumericKind, values: &[RamDomain]) -> Option<RamDomain> {
    if values.is_empty() {
        return None;
    }
    let total: f64 = values
        .iter()
        .map(|&v| match kind {
            NumericKind::Signed => f64::from(v),
            NumericKind::Unsigned => f64::from(to_unsigned(v)),
            NumericKind::Float => f64::from(to_float(v)),
        })
        .sum();
    Some(from_float((total / values.len() as f64) as RamFloat))
}
