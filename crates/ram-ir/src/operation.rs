//! RAM operations: the nested-loop body of a query.

use crate::condition::Condition;
use crate::expression::{Expression, Pattern};
use crate::types::NumericKind;

/// Iterate over every tuple of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scan {
    pub relation: String,
    pub tuple_id: usize,
    pub nested: Box<Operation>,
    /// The bound tuple is never read; the first match is enough.
    pub pure_existence: bool,
}

/// Iterate over the tuples matching a range pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexScan {
    pub relation: String,
    pub tuple_id: usize,
    pub pattern: Pattern,
    pub nested: Box<Operation>,
    pub pure_existence: bool,
}

/// Bind the first tuple satisfying `condition`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Choice {
    pub relation: String,
    pub tuple_id: usize,
    pub condition: Condition,
    pub nested: Box<Operation>,
}

/// Bind the first tuple matching `pattern` and satisfying `condition`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexChoice {
    pub relation: String,
    pub tuple_id: usize,
    pub pattern: Pattern,
    pub condition: Condition,
    pub nested: Box<Operation>,
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Min,
    Max,
    Count,
    Sum,
    Mean,
}

impl AggregateOp {
    pub fn name(self) -> &'static str {
        match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Mean => "mean",
        }
    }
}

/// Fold `expression` over the tuples satisfying `condition` and bind the
/// single-column result to `tuple_id` for the nested operation.
///
/// While folding, `tuple_id` is bound to each scanned tuple, so the
/// expression and condition read the relation through it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aggregate {
    pub relation: String,
    pub tuple_id: usize,
    pub function: AggregateOp,
    pub kind: NumericKind,
    pub expression: Expression,
    pub condition: Condition,
    pub nested: Box<Operation>,
}

/// [`Aggregate`] restricted to the tuples matching `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexAggregate {
    pub relation: String,
    pub tuple_id: usize,
    pub pattern: Pattern,
    pub function: AggregateOp,
    pub kind: NumericKind,
    pub expression: Expression,
    pub condition: Condition,
    pub nested: Box<Operation>,
}

/// Bind the components of the record `expression` to `tuple_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnpackRecord {
    pub expression: Expression,
    pub arity: usize,
    pub tuple_id: usize,
    pub nested: Box<Operation>,
}

/// A node of a query's loop nest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Scan(Scan),
    Choice(Choice),
    Aggregate(Aggregate),
    IndexScan(IndexScan),
    IndexChoice(IndexChoice),
    IndexAggregate(IndexAggregate),
    UnpackRecord(UnpackRecord),
    /// Continue into `nested` only when `condition` holds.
    Filter {
        condition: Condition,
        nested: Box<Operation>,
    },
    /// Abort the enclosing loop when `condition` holds.
    Break {
        condition: Condition,
        nested: Box<Operation>,
    },
    /// Insert the evaluated values into `relation`.
    Project {
        relation: String,
        values: Vec<Expression>,
    },
    /// Emit a result row from a subroutine.
    SubroutineReturn(Vec<Expression>),
}

impl Operation {
    pub fn scan(relation: impl Into<String>, tuple_id: usize, nested: Operation) -> Self {
        Operation::Scan(Scan {
            relation: relation.into(),
            tuple_id,
            nested: Box::new(nested),
            pure_existence: false,
        })
    }

    pub fn index_scan(
        relation: impl Into<String>,
        tuple_id: usize,
        pattern: Pattern,
        nested: Operation,
    ) -> Self {
        Operation::IndexScan(IndexScan {
            relation: relation.into(),
            tuple_id,
            pattern,
            nested: Box::new(nested),
            pure_existence: false,
        })
    }

    pub fn filter(condition: Condition, nested: Operation) -> Self {
        Operation::Filter {
            condition,
            nested: Box::new(nested),
        }
    }

    pub fn project(relation: impl Into<String>, values: Vec<Expression>) -> Self {
        Operation::Project {
            relation: relation.into(),
            values,
        }
    }

    pub fn aggregate(
        relation: impl Into<String>,
        tuple_id: usize,
        function: AggregateOp,
        expression: Expression,
        condition: Condition,
        nested: Operation,
    ) -> Self {
        Operation::Aggregate(Aggregate {
            relation: relation.into(),
            tuple_id,
            function,
            kind: NumericKind::Signed,
            expression,
            condition,
            nested: Box::new(nested),
        })
    }

    /// The tuple identifier this operation binds, if any.
    pub fn tuple_id(&self) -> Option<usize> {
        match self {
            Operation::Scan(s) => Some(s.tuple_id),
            Operation::IndexScan(s) => Some(s.tuple_id),
            Operation::Choice(c) => Some(c.tuple_id),
            Operation::IndexChoice(c) => Some(c.tuple_id),
            Operation::Aggregate(a) => Some(a.tuple_id),
            Operation::IndexAggregate(a) => Some(a.tuple_id),
            Operation::UnpackRecord(u) => Some(u.tuple_id),
            Operation::Filter { .. }
            | Operation::Break { .. }
            | Operation::Project { .. }
            | Operation::SubroutineReturn(_) => None,
        }
    }

    /// The relation read or written by this node, if any.
    pub fn relation(&self) -> Option<&str> {
        match self {
            Operation::Scan(s) => Some(&s.relation),
            Operation::IndexScan(s) => Some(&s.relation),
            Operation::Choice(c) => Some(&c.relation),
            Operation::IndexChoice(c) => Some(&c.relation),
            Operation::Aggregate(a) => Some(&a.relation),
            Operation::IndexAggregate(a) => Some(&a.relation),
            Operation::Project { relation, .. } => Some(relation),
            Operation::UnpackRecord(_)
            | Operation::Filter { .. }
            | Operation::Break { .. }
            | Operation::SubroutineReturn(_) => None,
        }
    }

    /// The range pattern of an indexed operation.
    pub fn pattern(&self) -> Option<&Pattern> {
        match self {
            Operation::IndexScan(s) => Some(&s.pattern),
            Operation::IndexChoice(c) => Some(&c.pattern),
            Operation::IndexAggregate(a) => Some(&a.pattern),
            _ => None,
        }
    }

    pub fn nested(&self) -> Option<&Operation> {
        match self {
            Operation::Scan(s) => Some(&s.nested),
            Operation::IndexScan(s) => Some(&s.nested),
            Operation::Choice(c) => Some(&c.nested),
            Operation::IndexChoice(c) => Some(&c.nested),
            Operation::Aggregate(a) => Some(&a.nested),
            Operation::IndexAggregate(a) => Some(&a.nested),
            Operation::UnpackRecord(u) => Some(&u.nested),
            Operation::Filter { nested, .. } | Operation::Break { nested, .. } => Some(nested),
            Operation::Project { .. } | Operation::SubroutineReturn(_) => None,
        }
    }

    pub fn nested_mut(&mut self) -> Option<&mut Box<Operation>> {
        match self {
            Operation::Scan(s) => Some(&mut s.nested),
            Operation::IndexScan(s) => Some(&mut s.nested),
            Operation::Choice(c) => Some(&mut c.nested),
            Operation::IndexChoice(c) => Some(&mut c.nested),
            Operation::Aggregate(a) => Some(&mut a.nested),
            Operation::IndexAggregate(a) => Some(&mut a.nested),
            Operation::UnpackRecord(u) => Some(&mut u.nested),
            Operation::Filter { nested, .. } | Operation::Break { nested, .. } => Some(nested),
            Operation::Project { .. } | Operation::SubroutineReturn(_) => None,
        }
    }

    /// Replace the nested operation, leaving leaves untouched.
    pub fn map_nested(self, f: impl FnOnce(Operation) -> Operation) -> Operation {
        fn apply(nested: Box<Operation>, f: impl FnOnce(Operation) -> Operation) -> Box<Operation> {
            Box::new(f(*nested))
        }
        match self {
            Operation::Scan(mut s) => {
                s.nested = apply(s.nested, f);
                Operation::Scan(s)
            }
            Operation::IndexScan(mut s) => {
                s.nested = apply(s.nested, f);
                Operation::IndexScan(s)
            }
            Operation::Choice(mut c) => {
                c.nested = apply(c.nested, f);
                Operation::Choice(c)
            }
            Operation::IndexChoice(mut c) => {
                c.nested = apply(c.nested, f);
                Operation::IndexChoice(c)
            }
            Operation::Aggregate(mut a) => {
                a.nested = apply(a.nested, f);
                Operation::Aggregate(a)
            }
            Operation::IndexAggregate(mut a) => {
                a.nested = apply(a.nested, f);
                Operation::IndexAggregate(a)
            }
            Operation::UnpackRecord(mut u) => {
                u.nested = apply(u.nested, f);
                Operation::UnpackRecord(u)
            }
            Operation::Filter { condition, nested } => Operation::Filter {
                condition,
                nested: apply(nested, f),
            },
            Operation::Break { condition, nested } => Operation::Break {
                condition,
                nested: apply(nested, f),
            },
            leaf @ (Operation::Project { .. } | Operation::SubroutineReturn(_)) => leaf,
        }
    }

    /// Rewrite bottom-up: children first, then `f` on the rebuilt node.
    pub fn rewrite(self, f: &mut impl FnMut(Operation) -> Operation) -> Operation {
        let rebuilt = self.map_nested(|n| n.rewrite(f));
        f(rebuilt)
    }

    /// Visit this operation and all nested operations, outermost first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Operation)) {
        let mut current = Some(self);
        while let Some(op) = current {
            f(op);
            current = op.nested();
        }
    }

    /// Visit every condition held directly by this node (not nested ones).
    pub fn own_conditions(&self) -> Vec<&Condition> {
        match self {
            Operation::Choice(c) => vec![&c.condition],
            Operation::IndexChoice(c) => vec![&c.condition],
            Operation::Aggregate(a) => vec![&a.condition],
            Operation::IndexAggregate(a) => vec![&a.condition],
            Operation::Filter { condition, .. } | Operation::Break { condition, .. } => {
                vec![condition]
            }
            _ => Vec::new(),
        }
    }

    /// Visit every expression held directly by this node (not nested ones),
    /// including expressions inside its conditions and pattern.
    pub fn for_each_own_expression<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        if let Some(pattern) = self.pattern() {
            for (_, e) in pattern.bound() {
                e.walk(f);
            }
        }
        for condition in self.own_conditions() {
            condition.for_each_expression(f);
        }
        match self {
            Operation::Aggregate(a) => a.expression.walk(f),
            Operation::IndexAggregate(a) => a.expression.walk(f),
            Operation::UnpackRecord(u) => u.expression.walk(f),
            Operation::Project { values, .. } | Operation::SubroutineReturn(values) => {
                for v in values {
                    v.walk(f);
                }
            }
            _ => {}
        }
    }

    /// Visit every expression of the whole subtree.
    pub fn for_each_expression<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        self.walk(&mut |op| op.for_each_own_expression(f));
    }

    /// True if any expression in the subtree reads a column of `tuple_id`.
    pub fn references_tuple(&self, tuple_id: usize) -> bool {
        let mut found = false;
        self.for_each_expression(&mut |e| {
            if let Expression::TupleElement { tuple_id: t, .. } = e
                && *t == tuple_id
            {
                found = true;
            }
        });
        found
    }

    /// Rebuild every expression held directly by this node through `f`.
    pub fn map_own_expressions(self, f: &mut impl FnMut(Expression) -> Expression) -> Operation {
        match self {
            Operation::Scan(s) => Operation::Scan(s),
            Operation::IndexScan(mut s) => {
                s.pattern = s.pattern.map(f);
                Operation::IndexScan(s)
            }
            Operation::Choice(mut c) => {
                c.condition = c.condition.map_expressions(f);
                Operation::Choice(c)
            }
            Operation::IndexChoice(mut c) => {
                c.pattern = c.pattern.map(f);
                c.condition = c.condition.map_expressions(f);
                Operation::IndexChoice(c)
            }
            Operation::Aggregate(mut a) => {
                a.expression = a.expression.map(f);
                a.condition = a.condition.map_expressions(f);
                Operation::Aggregate(a)
            }
            Operation::IndexAggregate(mut a) => {
                a.pattern = a.pattern.map(f);
                a.expression = a.expression.map(f);
                a.condition = a.condition.map_expressions(f);
                Operation::IndexAggregate(a)
            }
            Operation::UnpackRecord(mut u) => {
                u.expression = u.expression.map(f);
                Operation::UnpackRecord(u)
            }
            Operation::Filter { condition, nested } => Operation::Filter {
                condition: condition.map_expressions(f),
                nested,
            },
            Operation::Break { condition, nested } => Operation::Break {
                condition: condition.map_expressions(f),
                nested,
            },
            Operation::Project { relation, values } => Operation::Project {
                relation,
                values: values.into_iter().map(|v| v.map(f)).collect(),
            },
            Operation::SubroutineReturn(values) => {
                Operation::SubroutineReturn(values.into_iter().map(|v| v.map(f)).collect())
            }
        }
    }

    /// Rebuild every expression of the subtree through `f`.
    pub fn map_expressions(self, f: &mut impl FnMut(Expression) -> Expression) -> Operation {
        self.rewrite(&mut |op| op.map_own_expressions(f))
    }

    /// Replace tuple identifiers in every expression of the subtree.
    ///
    /// Binding sites keep their identifiers.
    pub fn rename_tuples(self, rename: &impl Fn(usize) -> usize) -> Operation {
        self.map_expressions(&mut |e| match e {
            Expression::TupleElement { tuple_id, element } => Expression::TupleElement {
                tuple_id: rename(tuple_id),
                element,
            },
            other => other,
        })
    }
}
