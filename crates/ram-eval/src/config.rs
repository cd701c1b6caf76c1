//! Engine configuration.

use ram_opt::IndexStrategy;
use serde::{Deserialize, Serialize};

/// Knobs of a single engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for partitioned scans. `1` runs everything on the
    /// calling thread.
    pub num_threads: usize,
    /// Smallest relation an outermost scan is partitioned over.
    pub parallel_threshold: usize,
    /// Report timer statements at info level instead of debug.
    pub profile: bool,
    /// How search signatures are grouped into physical indexes.
    pub index_strategy: IndexStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            num_threads: 1,
            parallel_threshold: 1024,
            profile: false,
            index_strategy: IndexStrategy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);
        self
    }

    pub fn with_parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_index_strategy(mut self, index_strategy: IndexStrategy) -> Self {
        self.index_strategy = index_strategy;
        self
    }

    /// Whether queries may fan out over a thread pool at all.
    pub fn is_parallel(&self) -> bool {
        self.num_threads > 1
    }
}
