//! The configurable rewrite pipeline.

use ram_ir::Program;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::transform::{
    CollapseFilters, ConvertExistenceChecks, CreateIndices, ExpandFilter, FixpointTransformer,
    HoistAggregate, IfConversion, ReorderDelta, Transformer,
};

/// Passes a pipeline can be assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassName {
    ExpandFilter,
    CreateIndices,
    CollapseFilters,
    HoistAggregate,
    ReorderDelta,
    IfConversion,
    ConvertExistenceChecks,
}

impl PassName {
    /// Passes that run to a fixpoint rather than once.
    pub fn repeats(self) -> bool {
        matches!(self, PassName::CreateIndices | PassName::HoistAggregate)
    }

    fn build(self) -> Box<dyn Transformer> {
        match self {
            PassName::ExpandFilter => Box::new(ExpandFilter),
            PassName::CreateIndices => Box::new(CreateIndices::new()),
            PassName::CollapseFilters => Box::new(CollapseFilters),
            PassName::HoistAggregate => Box::new(HoistAggregate::new()),
            PassName::ReorderDelta => Box::new(ReorderDelta),
            PassName::IfConversion => Box::new(IfConversion),
            PassName::ConvertExistenceChecks => Box::new(ConvertExistenceChecks),
        }
    }
}

/// Which passes run, in which order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub passes: Vec<PassName>,
    /// Bound on the iterations of repeating passes.
    pub max_iterations: usize,
    /// Record a listing of the program before and after every change.
    pub trace: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            passes: vec![
                PassName::ExpandFilter,
                PassName::CreateIndices,
                PassName::CollapseFilters,
                PassName::HoistAggregate,
                PassName::ReorderDelta,
                PassName::IfConversion,
                PassName::CollapseFilters,
                PassName::ConvertExistenceChecks,
            ],
            max_iterations: 100,
            trace: false,
        }
    }
}

impl PipelineConfig {
    /// A pipeline that leaves programs untouched.
    pub fn empty() -> Self {
        PipelineConfig {
            passes: Vec::new(),
            ..PipelineConfig::default()
        }
    }

    pub fn with_passes(mut self, passes: Vec<PassName>) -> Self {
        self.passes = passes;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_trace(mut self, enable: bool) -> Self {
        self.trace = enable;
        self
    }
}

/// Listing of the program around one pass that changed it.
#[derive(Debug, Clone)]
pub struct PassTrace {
    pub pass: &'static str,
    pub before: String,
    pub after: String,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone)]
pub struct OptimizedProgram {
    pub program: Program,
    pub changed: bool,
    /// Number of passes that changed the program.
    pub passes_applied: usize,
    /// Filled only when tracing is enabled.
    pub trace: Vec<PassTrace>,
}

/// An ordered list of passes.
pub struct Pipeline {
    passes: Vec<Box<dyn Transformer>>,
    trace: bool,
}

impl Pipeline {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let passes = config
            .passes
            .iter()
            .map(|name| {
                let pass = name.build();
                if name.repeats() {
                    Box::new(FixpointTransformer::new(pass, config.max_iterations))
                        as Box<dyn Transformer>
                } else {
                    pass
                }
            })
            .collect();
        Pipeline {
            passes,
            trace: config.trace,
        }
    }

    pub fn new(passes: Vec<Box<dyn Transformer>>) -> Self {
        Pipeline {
            passes,
            trace: false,
        }
    }

    /// Add a pass at the end.
    pub fn push<T: Transformer + 'static>(&mut self, pass: T) {
        self.passes.push(Box::new(pass));
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn run(&self, program: Program) -> OptimizedProgram {
        let mut current = program;
        let mut passes_applied = 0;
        let mut traces = Vec::new();

        for pass in &self.passes {
            let before = self.trace.then(|| current.to_string());
            let result = pass.transform(current);
            if result.changed {
                passes_applied += 1;
                debug!(pass = pass.name(), "pass changed program");
                if let Some(before) = before {
                    let after = result.program.to_string();
                    trace!(pass = pass.name(), "{after}");
                    traces.push(PassTrace {
                        pass: pass.name(),
                        before,
                        after,
                    });
                }
            }
            current = result.program;
        }

        debug!(passes_applied, "pipeline finished");
        OptimizedProgram {
            program: current,
            changed: passes_applied > 0,
            passes_applied,
            trace: traces,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::from_config(&PipelineConfig::default())
    }
}

/// Run the default pipeline.
pub fn optimize(program: Program) -> Program {
    Pipeline::default().run(program).program
}
