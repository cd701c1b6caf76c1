//! Node model for the relational algebra machine (RAM).
//!
//! A RAM program is a tree of [`Statement`]s whose queries are nested-loop
//! [`Operation`]s over relations, guarded by [`Condition`]s and computing
//! [`Expression`]s. Every child is owned by its parent; relations are
//! referenced by name. Trees are rebuilt, never mutated in place: the rewrite
//! helpers consume a subtree and return its replacement.
//!
//! # Example
//!
//! ```
//! use ram_ir::{Condition, Expression, Operation, Program, RelationDecl, Statement};
//!
//! // out(y) :- edge(1, y).
//! let query = Operation::scan(
//!     "edge",
//!     0,
//!     Operation::filter(
//!         Condition::equal(Expression::element(0, 0), Expression::constant(1)),
//!         Operation::project("out", vec![Expression::element(0, 1)]),
//!     ),
//! );
//! let program = Program::new(
//!     vec![RelationDecl::new("edge", 2), RelationDecl::new("out", 1)],
//!     Statement::query(query),
//! );
//! program.validate();
//! assert!(program.to_string().contains("FOR t0 IN edge"));
//! ```

pub mod condition;
mod display;
pub mod expression;
pub mod node;
pub mod operation;
pub mod program;
pub mod signature;
pub mod statement;
pub mod types;

pub use condition::{Condition, ConstraintOp};
pub use expression::{Expression, IntrinsicOp, Pattern};
pub use node::{NodeKind, NodeRef};
pub use operation::{
    Aggregate, AggregateOp, Choice, IndexAggregate, IndexChoice, IndexScan, Operation, Scan,
    UnpackRecord,
};
pub use program::{Program, RelationDecl, Representation, delta_base, delta_name, new_name};
pub use signature::{LexOrder, SearchSignature};
pub use statement::Statement;
pub use types::{NumericKind, RamDomain, RamFloat, RamSigned, RamUnsigned, TypeAttribute};

#[doc(hidden)]
pub use tracing as __tracing;

/// Abort on a violated internal invariant or a malformed program.
///
/// Logs the diagnostic at error level, then panics with the same message.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        $crate::__tracing::error!(%message, "fatal RAM invariant violation");
        panic!("{}", message)
    }};
}
