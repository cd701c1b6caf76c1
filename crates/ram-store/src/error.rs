use ram_ir::TypeAttribute;
use thiserror::Error;

/// Errors surfaced through the relation interface.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("relation `{0}` does not exist")]
    UnknownRelation(String),

    #[error("relation `{relation}` has arity {expected}, got a tuple of width {found}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        found: usize,
    },

    #[error("column {column} of `{relation}` holds {expected} values, cannot read `{value}`")]
    TypeMismatch {
        relation: String,
        column: usize,
        expected: TypeAttribute,
        value: String,
    },

    #[error("cannot swap `{0}` and `{1}`: declarations differ")]
    IncompatibleSwap(String, String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
