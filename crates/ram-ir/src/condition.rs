//! RAM conditions.

use crate::expression::{Expression, Pattern};
use crate::types::NumericKind;

/// A boolean-valued RAM node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    True,
    False,
    Conjunction(Box<Condition>, Box<Condition>),
    Negation(Box<Condition>),
    /// Binary comparison of two expressions.
    Constraint {
        op: ConstraintOp,
        kind: NumericKind,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// Does the relation hold a tuple matching the pattern?
    ExistenceCheck { relation: String, pattern: Pattern },
    /// Like [`Condition::ExistenceCheck`] over the key columns, additionally
    /// requiring the stored first auxiliary column to be no greater than the
    /// probe's.
    ProvenanceExistenceCheck { relation: String, pattern: Pattern },
    /// Is the relation empty?
    EmptinessCheck(String),
}

/// Comparison operators of [`Condition::Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Regular-expression match of rhs against the pattern in lhs.
    Match,
    NotMatch,
    /// Substring test: lhs occurs in rhs.
    Contains,
    NotContains,
}

impl ConstraintOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ConstraintOp::Eq => "=",
            ConstraintOp::Ne => "!=",
            ConstraintOp::Lt => "<",
            ConstraintOp::Le => "<=",
            ConstraintOp::Gt => ">",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Match => "match",
            ConstraintOp::NotMatch => "not_match",
            ConstraintOp::Contains => "contains",
            ConstraintOp::NotContains => "not_contains",
        }
    }
}

impl Condition {
    /// Signed equality `lhs = rhs`.
    pub fn equal(lhs: Expression, rhs: Expression) -> Self {
        Condition::constraint(ConstraintOp::Eq, lhs, rhs)
    }

    /// Signed comparison `lhs op rhs`.
    pub fn constraint(op: ConstraintOp, lhs: Expression, rhs: Expression) -> Self {
        Condition::Constraint {
            op,
            kind: NumericKind::Signed,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn negate(condition: Condition) -> Self {
        Condition::Negation(Box::new(condition))
    }

    pub fn and(lhs: Condition, rhs: Condition) -> Self {
        Condition::Conjunction(Box::new(lhs), Box::new(rhs))
    }

    pub fn exists(relation: impl Into<String>, pattern: Pattern) -> Self {
        Condition::ExistenceCheck {
            relation: relation.into(),
            pattern,
        }
    }

    pub fn empty(relation: impl Into<String>) -> Self {
        Condition::EmptinessCheck(relation.into())
    }

    /// Left-nested conjunction of `conditions`; `True` when empty.
    pub fn conjoin(conditions: impl IntoIterator<Item = Condition>) -> Self {
        conditions
            .into_iter()
            .reduce(Condition::and)
            .unwrap_or(Condition::True)
    }

    /// Flatten nested conjunctions, left to right.
    pub fn conjuncts(self) -> Vec<Condition> {
        let mut out = Vec::new();
        self.push_conjuncts(&mut out);
        out
    }

    fn push_conjuncts(self, out: &mut Vec<Condition>) {
        match self {
            Condition::Conjunction(lhs, rhs) => {
                lhs.push_conjuncts(out);
                rhs.push_conjuncts(out);
            }
            other => out.push(other),
        }
    }

    /// Visit every expression reachable from this condition, including
    /// pattern entries.
    pub fn for_each_expression<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        match self {
            Condition::True | Condition::False | Condition::EmptinessCheck(_) => {}
            Condition::Conjunction(lhs, rhs) => {
                lhs.for_each_expression(f);
                rhs.for_each_expression(f);
            }
            Condition::Negation(inner) => inner.for_each_expression(f),
            Condition::Constraint { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Condition::ExistenceCheck { pattern, .. }
            | Condition::ProvenanceExistenceCheck { pattern, .. } => {
                for (_, e) in pattern.bound() {
                    e.walk(f);
                }
            }
        }
    }

    /// Visit this condition and every sub-condition, parents first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Condition)) {
        f(self);
        match self {
            Condition::Conjunction(lhs, rhs) => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Condition::Negation(inner) => inner.walk(f),
            _ => {}
        }
    }

    /// Rebuild every expression of this condition bottom-up through `f`.
    pub fn map_expressions(self, f: &mut impl FnMut(Expression) -> Expression) -> Condition {
        match self {
            Condition::Conjunction(lhs, rhs) => Condition::Conjunction(
                Box::new(lhs.map_expressions(f)),
                Box::new(rhs.map_expressions(f)),
            ),
            Condition::Negation(inner) => Condition::Negation(Box::new(inner.map_expressions(f))),
            Condition::Constraint { op, kind, lhs, rhs } => Condition::Constraint {
                op,
                kind,
                lhs: Box::new(lhs.map(f)),
                rhs: Box::new(rhs.map(f)),
            },
            Condition::ExistenceCheck { relation, pattern } => Condition::ExistenceCheck {
                relation,
                pattern: pattern.map(f),
            },
            Condition::ProvenanceExistenceCheck { relation, pattern } => {
                Condition::ProvenanceExistenceCheck {
                    relation,
                    pattern: pattern.map(f),
                }
            }
            leaf => leaf,
        }
    }

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

    /// Relations read by this condition.
    pub fn relations(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |c| match c {
            Condition::ExistenceCheck { relation, .. }
            | Condition::ProvenanceExistenceCheck { relation, .. }
            | Condition::EmptinessCheck(relation) => out.push(relation.as_str()),
            _ => {}
        });
        out
    }
}
