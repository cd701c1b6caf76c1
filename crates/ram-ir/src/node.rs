//! Flat node kinds and borrowed views over any RAM node.
//!
//! The four node families are distinct enums; [`NodeKind`] lists every kind
//! in one ordered discriminant so that family and sub-family membership are
//! contiguous range tests.

use std::ops::RangeInclusive;

use crate::condition::Condition;
use crate::expression::Expression;
use crate::operation::Operation;
use crate::statement::Statement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    // ─── Expressions ────────────────────────────────────────────────
    Constant,
    StringConstant,
    TupleElement,
    AutoIncrement,
    UndefValue,
    Intrinsic,
    PackRecord,
    SubroutineArgument,
    RelationSize,
    // ─── Conditions ─────────────────────────────────────────────────
    True,
    False,
    Conjunction,
    Negation,
    Constraint,
    ExistenceCheck,
    ProvenanceExistenceCheck,
    EmptinessCheck,
    // ─── Operations ─────────────────────────────────────────────────
    Scan,
    Choice,
    Aggregate,
    IndexScan,
    IndexChoice,
    IndexAggregate,
    UnpackRecord,
    Filter,
    Break,
    Project,
    SubroutineReturn,
    // ─── Statements ─────────────────────────────────────────────────
    Sequence,
    Parallel,
    Loop,
    Exit,
    Query,
    Swap,
    Merge,
    Extend,
    Clear,
    Call,
    LogTimer,
    LogRelationTimer,
    LogSize,
    DebugInfo,
}

impl NodeKind {
    pub const EXPRESSIONS: RangeInclusive<NodeKind> = NodeKind::Constant..=NodeKind::RelationSize;
    pub const CONDITIONS: RangeInclusive<NodeKind> = NodeKind::True..=NodeKind::EmptinessCheck;
    pub const OPERATIONS: RangeInclusive<NodeKind> = NodeKind::Scan..=NodeKind::SubroutineReturn;
    pub const STATEMENTS: RangeInclusive<NodeKind> = NodeKind::Sequence..=NodeKind::DebugInfo;
    /// Operations that bind a tuple identifier.
    pub const TUPLE_OPERATIONS: RangeInclusive<NodeKind> =
        NodeKind::Scan..=NodeKind::UnpackRecord;
    /// Operations that read a relation.
    pub const RELATION_OPERATIONS: RangeInclusive<NodeKind> =
        NodeKind::Scan..=NodeKind::IndexAggregate;
    /// Operations that carry a range pattern.
    pub const INDEX_OPERATIONS: RangeInclusive<NodeKind> =
        NodeKind::IndexScan..=NodeKind::IndexAggregate;

    pub fn is_expression(self) -> bool {
        Self::EXPRESSIONS.contains(&self)
    }

    pub fn is_condition(self) -> bool {
        Self::CONDITIONS.contains(&self)
    }

    pub fn is_operation(self) -> bool {
        Self::OPERATIONS.contains(&self)
    }

    pub fn is_statement(self) -> bool {
        Self::STATEMENTS.contains(&self)
    }

    pub fn is_tuple_operation(self) -> bool {
        Self::TUPLE_OPERATIONS.contains(&self)
    }

    pub fn is_relation_operation(self) -> bool {
        Self::RELATION_OPERATIONS.contains(&self)
    }

    pub fn is_index_operation(self) -> bool {
        Self::INDEX_OPERATIONS.contains(&self)
    }
}

impl Expression {
    pub fn kind(&self) -> NodeKind {
        match self {
            Expression::Constant(_) => NodeKind::Constant,
            Expression::StringConstant(_) => NodeKind::StringConstant,
            Expression::TupleElement { .. } => NodeKind::TupleElement,
            Expression::AutoIncrement => NodeKind::AutoIncrement,
            Expression::UndefValue => NodeKind::UndefValue,
            Expression::Intrinsic { .. } => NodeKind::Intrinsic,
            Expression::PackRecord(_) => NodeKind::PackRecord,
            Expression::SubroutineArgument(_) => NodeKind::SubroutineArgument,
            Expression::RelationSize(_) => NodeKind::RelationSize,
        }
    }
}

impl Condition {
    pub fn kind(&self) -> NodeKind {
        match self {
            Condition::True => NodeKind::True,
            Condition::False => NodeKind::False,
            Condition::Conjunction(..) => NodeKind::Conjunction,
            Condition::Negation(_) => NodeKind::Negation,
            Condition::Constraint { .. } => NodeKind::Constraint,
            Condition::ExistenceCheck { .. } => NodeKind::ExistenceCheck,
            Condition::ProvenanceExistenceCheck { .. } => NodeKind::ProvenanceExistenceCheck,
            Condition::EmptinessCheck(_) => NodeKind::EmptinessCheck,
        }
    }
}

impl Operation {
    pub fn kind(&self) -> NodeKind {
        match self {
            Operation::Scan(_) => NodeKind::Scan,
            Operation::Choice(_) => NodeKind::Choice,
            Operation::Aggregate(_) => NodeKind::Aggregate,
            Operation::IndexScan(_) => NodeKind::IndexScan,
            Operation::IndexChoice(_) => NodeKind::IndexChoice,
            Operation::IndexAggregate(_) => NodeKind::IndexAggregate,
            Operation::UnpackRecord(_) => NodeKind::UnpackRecord,
            Operation::Filter { .. } => NodeKind::Filter,
            Operation::Break { .. } => NodeKind::Break,
            Operation::Project { .. } => NodeKind::Project,
            Operation::SubroutineReturn(_) => NodeKind::SubroutineReturn,
        }
    }
}

impl Statement {
    pub fn kind(&self) -> NodeKind {
        match self {
            Statement::Sequence(_) => NodeKind::Sequence,
            Statement::Parallel(_) => NodeKind::Parallel,
            Statement::Loop(_) => NodeKind::Loop,
            Statement::Exit(_) => NodeKind::Exit,
            Statement::Query(_) => NodeKind::Query,
            Statement::Swap(..) => NodeKind::Swap,
            Statement::Merge { .. } => NodeKind::Merge,
            Statement::Extend { .. } => NodeKind::Extend,
            Statement::Clear(_) => NodeKind::Clear,
            Statement::Call(_) => NodeKind::Call,
            Statement::LogTimer { .. } => NodeKind::LogTimer,
            Statement::LogRelationTimer { .. } => NodeKind::LogRelationTimer,
            Statement::LogSize { .. } => NodeKind::LogSize,
            Statement::DebugInfo { .. } => NodeKind::DebugInfo,
        }
    }
}

/// A borrowed reference to a node of any family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef<'a> {
    Expression(&'a Expression),
    Condition(&'a Condition),
    Operation(&'a Operation),
    Statement(&'a Statement),
}

impl NodeRef<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Expression(e) => e.kind(),
            NodeRef::Condition(c) => c.kind(),
            NodeRef::Operation(o) => o.kind(),
            NodeRef::Statement(s) => s.kind(),
        }
    }
}

impl<'a> From<&'a Expression> for NodeRef<'a> {
    fn from(e: &'a Expression) -> Self {
        NodeRef::Expression(e)
    }
}

impl<'a> From<&'a Condition> for NodeRef<'a> {
    fn from(c: &'a Condition) -> Self {
        NodeRef::Condition(c)
    }
}

impl<'a> From<&'a Operation> for NodeRef<'a> {
    fn from(o: &'a Operation) -> Self {
        NodeRef::Operation(o)
    }
}

impl<'a> From<&'a Statement> for NodeRef<'a> {
    fn from(s: &'a Statement) -> Self {
        NodeRef::Statement(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_ranges_are_disjoint() {
        let all = [
            NodeKind::Constant,
            NodeKind::RelationSize,
            NodeKind::True,
            NodeKind::EmptinessCheck,
            NodeKind::Scan,
            NodeKind::SubroutineReturn,
            NodeKind::Sequence,
            NodeKind::Extend,
            NodeKind::LogSize,
            NodeKind::DebugInfo,
        ];
        for kind in all {
            let families = [
                kind.is_expression(),
                kind.is_condition(),
                kind.is_operation(),
                kind.is_statement(),
            ];
            assert_eq!(families.iter().filter(|&&b| b).count(), 1, "{kind:?}");
        }
    }

    #[test]
    fn test_sub_family_ranges() {
        assert!(NodeKind::IndexChoice.is_index_operation());
        assert!(!NodeKind::Choice.is_index_operation());
        assert!(NodeKind::UnpackRecord.is_tuple_operation());
        assert!(!NodeKind::UnpackRecord.is_relation_operation());
        assert!(!NodeKind::Filter.is_tuple_operation());
    }

    #[test]
    fn test_kind_matches_payload() {
        let e = Expression::element(0, 1);
        assert_eq!(NodeRef::from(&e).kind(), NodeKind::TupleElement);
        let c = Condition::empty("r");
        assert_eq!(NodeRef::from(&c).kind(), NodeKind::EmptinessCheck);
    }
}
