//! Interpreter for RAM programs.
//!
//! The [`Engine`] executes a program's statements against an in-memory
//! store, evaluating queries as nested loops and semi-naive fixpoints as
//! loops over delta buffers.
//!
//! # Example
//!
//! ```
//! use ram_eval::{Engine, EngineConfig};
//! use ram_ir::{Expression, Operation, Program, RelationDecl, Statement};
//!
//! // flipped(y, x) :- edge(x, y).
//! let program = Program::new(
//!     vec![RelationDecl::new("edge", 2), RelationDecl::new("flipped", 2)],
//!     Statement::query(Operation::scan(
//!         "edge",
//!         0,
//!         Operation::project(
//!             "flipped",
//!             vec![Expression::element(0, 1), Expression::element(0, 0)],
//!         ),
//!     )),
//! );
//! let engine = Engine::new(&program, EngineConfig::default());
//!
//! // Insert initial facts
//! engine.insert("edge", &[1, 2]).unwrap();
//! engine.insert("edge", &[2, 3]).unwrap();
//!
//! engine.run();
//!
//! let flipped = engine.relation("flipped").unwrap();
//! assert!(flipped.contains(&[3, 2]));
//! assert_eq!(flipped.len(), 2);
//! ```

pub mod aggregators;
mod config;
mod context;
mod engine;
pub mod expr;

pub use config::EngineConfig;
pub use context::Context;
pub use engine::{Engine, RunStats};
pub use expr::RegexCache;
