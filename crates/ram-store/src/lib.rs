//! Relation storage for the RAM interpreter.
//!
//! Relations keep their tuples in one or more lexicographically ordered
//! indexes ([`OrderedIndex`]) chosen by index analysis. Every insert updates
//! all of them under one lock; scans run over cheap copy-on-write
//! [`Snapshot`]s and can be split into [`Partition`]s for parallel work.
//! Strings and records are interned into [`RamDomain`](ram_ir::RamDomain)
//! values through explicit [`SymbolTable`] and [`RecordTable`] handles.

pub mod database;
pub mod eqrel;
pub mod error;
pub mod forall;
pub mod index;
pub mod records;
pub mod relation;
pub mod symbols;

pub use database::Database;
pub use eqrel::EquivalenceRelation;
pub use error::{Result, StoreError};
pub use forall::ForallIndex;
pub use index::{IndexPartition, IndexSnapshot, OrderedIndex, RangePattern, Tuple};
pub use records::{NIL, RecordTable};
pub use relation::{AuxPolicy, Partition, Relation, RelationInterface, Snapshot};
pub use symbols::SymbolTable;
