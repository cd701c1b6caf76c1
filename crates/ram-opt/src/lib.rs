//! Analyses and rewrites over RAM programs.
//!
//! [`LevelAnalysis`] tells how deep in a loop nest a node can be evaluated,
//! [`IndexAnalysis`] picks the lexicographic orders each relation must be
//! stored in, and [`Pipeline`] runs the rewrite passes of [`transform`].

pub mod index;
pub mod level;
pub mod pipeline;
pub mod transform;

pub use index::{IndexAnalysis, IndexCluster, IndexStrategy, collect_searches};
pub use level::{Level, LevelAnalysis};
pub use pipeline::{OptimizedProgram, PassName, PassTrace, Pipeline, PipelineConfig, optimize};
pub use transform::{Transformed, Transformer, TransformerSequence};
