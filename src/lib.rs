//! Relational algebra machine.
//!
//! Ties the rewrite pipeline ([`ram_opt`]) to the interpreter
//! ([`ram_eval`]): a lowered program is optimized, its indexes are selected,
//! and the resulting engine runs it against the store ([`ram_store`]).
//!
//! # Example
//!
//! ```
//! use ram_interpreter::{Config, compile, programs};
//!
//! let engine = compile(&programs::transitive_closure(), &Config::default());
//! for edge in programs::chain(3) {
//!     engine.insert("edge", &edge).unwrap();
//! }
//! engine.run();
//!
//! let path = engine.relation("path").unwrap();
//! assert_eq!(path.len(), 6); // (0,1) (0,2) (0,3) (1,2) (1,3) (2,3)
//! ```

mod config;
pub mod programs;

pub use config::{Config, ConfigError, Result};
pub use ram_eval::{Engine, EngineConfig, RunStats};
pub use ram_ir::Program;
pub use ram_opt::{OptimizedProgram, Pipeline, PipelineConfig};
pub use ram_eval;
pub use ram_ir;
pub use ram_opt;
pub use ram_store;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging with a default filter.
///
/// Use the `RUST_LOG` environment variable to override the default of
/// `warn`. Calling this again after a subscriber is installed does nothing.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Run the configured rewrite pipeline over `program`.
pub fn optimize(program: Program, config: &PipelineConfig) -> OptimizedProgram {
    let optimized = Pipeline::from_config(config).run(program);
    info!(
        passes_applied = optimized.passes_applied,
        changed = optimized.changed,
        "optimized program"
    );
    optimized
}

/// Optimize `program` and build an engine for the result.
pub fn compile(program: &Program, config: &Config) -> Engine {
    let optimized = optimize(program.clone(), &config.pipeline);
    Engine::new(&optimized.program, config.engine.clone())
}
