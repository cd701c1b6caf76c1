//! RAM expressions and range patterns.

use crate::signature::SearchSignature;
use crate::types::{NumericKind, RamDomain, RamFloat, RamUnsigned, from_float, from_unsigned};

/// A value-producing RAM node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// A literal already encoded in the domain.
    Constant(RamDomain),
    /// A string literal, interned by the executor on first evaluation.
    StringConstant(String),
    /// Column `element` of the tuple bound to `tuple_id`.
    TupleElement { tuple_id: usize, element: usize },
    /// A fresh value from the global counter on every evaluation.
    AutoIncrement,
    /// Placeholder for an unconstrained value.
    UndefValue,
    /// A built-in operator applied to its arguments.
    Intrinsic {
        op: IntrinsicOp,
        kind: NumericKind,
        args: Vec<Expression>,
    },
    /// Intern the argument values as a record and yield its id.
    PackRecord(Vec<Expression>),
    /// Positional argument of the running subroutine.
    SubroutineArgument(usize),
    /// Current number of tuples in a relation.
    RelationSize(String),
}

impl Expression {
    pub fn constant(value: RamDomain) -> Self {
        Expression::Constant(value)
    }

    pub fn unsigned(value: RamUnsigned) -> Self {
        Expression::Constant(from_unsigned(value))
    }

    pub fn float(value: RamFloat) -> Self {
        Expression::Constant(from_float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::StringConstant(value.into())
    }

    pub fn element(tuple_id: usize, element: usize) -> Self {
        Expression::TupleElement { tuple_id, element }
    }

    /// Signed intrinsic applied to `args`.
    pub fn intrinsic(op: IntrinsicOp, args: Vec<Expression>) -> Self {
        Expression::Intrinsic {
            op,
            kind: NumericKind::Signed,
            args,
        }
    }

    pub fn typed_intrinsic(op: IntrinsicOp, kind: NumericKind, args: Vec<Expression>) -> Self {
        Expression::Intrinsic { op, kind, args }
    }

    /// True for literal nodes whose value never depends on evaluation state.
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Expression::Constant(_) | Expression::StringConstant(_)
        )
    }

    /// Direct sub-expressions.
    pub fn children(&self) -> &[Expression] {
        match self {
            Expression::Intrinsic { args, .. } | Expression::PackRecord(args) => args,
            _ => &[],
        }
    }

    /// Visit this expression and every sub-expression, parents first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Rebuild the expression bottom-up, applying `f` to every node after its
    /// children have been rewritten.
    pub fn map(self, f: &mut impl FnMut(Expression) -> Expression) -> Expression {
        let rebuilt = match self {
            Expression::Intrinsic { op, kind, args } => Expression::Intrinsic {
                op,
                kind,
                args: args.into_iter().map(|a| a.map(f)).collect(),
            },
            Expression::PackRecord(args) => {
                Expression::PackRecord(args.into_iter().map(|a| a.map(f)).collect())
            }
            other => other,
        };
        f(rebuilt)
    }

    /// True if any node of this expression reads a column of `tuple_id`.
    pub fn references_tuple(&self, tuple_id: usize) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let Expression::TupleElement { tuple_id: t, .. } = e
                && *t == tuple_id
            {
                found = true;
            }
        });
        found
    }

    /// Replace tuple identifiers according to `rename`.
    pub fn rename_tuples(self, rename: &impl Fn(usize) -> usize) -> Expression {
        self.map(&mut |e| match e {
            Expression::TupleElement { tuple_id, element } => Expression::TupleElement {
                tuple_id: rename(tuple_id),
                element,
            },
            other => other,
        })
    }
}

/// Built-in operators usable inside [`Expression::Intrinsic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicOp {
    // unary
    Neg,
    BNot,
    LNot,
    Ord,
    StrLen,
    ToNumber,
    ToString,
    ToFloat,
    ToSigned,
    ToUnsigned,
    // binary
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BAnd,
    BOr,
    BXor,
    BShiftL,
    BShiftR,
    LAnd,
    LOr,
    // variadic
    Max,
    Min,
    Cat,
    // ternary
    SubStr,
}

impl IntrinsicOp {
    /// Required argument count, or `None` for variadic operators.
    pub fn arity(self) -> Option<usize> {
        use IntrinsicOp::*;
        match self {
            Neg | BNot | LNot | Ord | StrLen | ToNumber | ToString | ToFloat | ToSigned
            | ToUnsigned => Some(1),
            Add | Sub | Mul | Div | Mod | Exp | BAnd | BOr | BXor | BShiftL | BShiftR | LAnd
            | LOr => Some(2),
            SubStr => Some(3),
            Max | Min | Cat => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        use IntrinsicOp::*;
        match self {
            Neg => "-",
            BNot => "bnot",
            LNot => "lnot",
            Ord => "ord",
            StrLen => "strlen",
            ToNumber => "to_number",
            ToString => "to_string",
            ToFloat => "to_float",
            ToSigned => "to_signed",
            ToUnsigned => "to_unsigned",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Exp => "^",
            BAnd => "band",
            BOr => "bor",
            BXor => "bxor",
            BShiftL => "bshl",
            BShiftR => "bshr",
            LAnd => "land",
            LOr => "lor",
            Max => "max",
            Min => "min",
            Cat => "cat",
            SubStr => "substr",
        }
    }

    /// Binary operators printed infix in listings.
    pub fn is_infix(self) -> bool {
        use IntrinsicOp::*;
        matches!(self, Add | Sub | Mul | Div | Mod | Exp)
    }
}

/// Per-column bound expressions of a range query; `None` is a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Pattern(pub Vec<Option<Expression>>);

impl Pattern {
    /// A pattern with every column unbound.
    pub fn wildcard(arity: usize) -> Self {
        Pattern(vec![None; arity])
    }

    /// A pattern with every column bound.
    pub fn total(values: Vec<Expression>) -> Self {
        Pattern(values.into_iter().map(Some).collect())
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, column: usize) -> Option<&Expression> {
        self.0.get(column).and_then(Option::as_ref)
    }

    pub fn is_bound(&self, column: usize) -> bool {
        self.get(column).is_some()
    }

    /// Bind `column` to `value`, replacing any earlier binding.
    pub fn bind(&mut self, column: usize, value: Expression) {
        self.0[column] = Some(value);
    }

    /// Bound entries with their column index.
    pub fn bound(&self) -> impl Iterator<Item = (usize, &Expression)> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(c, e)| e.as_ref().map(|e| (c, e)))
    }

    /// The set of bound columns.
    pub fn signature(&self) -> SearchSignature {
        SearchSignature::from_columns(self.bound().map(|(c, _)| c))
    }

    pub fn is_total(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn references_tuple(&self, tuple_id: usize) -> bool {
        self.bound().any(|(_, e)| e.references_tuple(tuple_id))
    }

    pub fn map(self, f: &mut impl FnMut(Expression) -> Expression) -> Pattern {
        Pattern(self.0.into_iter().map(|e| e.map(|e| e.map(f))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_tuple_through_records() {
        let expr = Expression::PackRecord(vec![
            Expression::constant(1),
            Expression::intrinsic(
                IntrinsicOp::Add,
                vec![Expression::element(3, 0), Expression::constant(2)],
            ),
        ]);
        assert!(expr.references_tuple(3));
        assert!(!expr.references_tuple(0));
    }

    #[test]
    fn test_rename_tuples() {
        let expr = Expression::intrinsic(
            IntrinsicOp::Sub,
            vec![Expression::element(0, 1), Expression::element(1, 0)],
        );
        let swapped = expr.rename_tuples(&|t| 1 - t);
        assert_eq!(
            swapped,
            Expression::intrinsic(
                IntrinsicOp::Sub,
                vec![Expression::element(1, 1), Expression::element(0, 0)],
            )
        );
    }

    #[test]
    fn test_pattern_signature() {
        let mut pattern = Pattern::wildcard(3);
        pattern.bind(2, Expression::constant(7));
        pattern.bind(0, Expression::element(0, 1));
        assert_eq!(pattern.signature(), SearchSignature::from_columns([0, 2]));
        assert!(!pattern.is_total());
        assert!(pattern.references_tuple(0));
    }
}
