//! Configuration loading.

use std::fs;
use std::path::{Path, PathBuf};

use ram_eval::EngineConfig;
use ram_opt::PipelineConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Configuration result type.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Settings for optimizing and running a program.
///
/// Every section and field is optional in TOML; missing ones take their
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Config::from_toml_str(&source)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ram_opt::{IndexStrategy, PassName};

    #[test]
    fn test_empty_source_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml_str(
            r#"
            [pipeline]
            passes = ["expand_filter", "create_indices"]

            [engine]
            num_threads = 4
            index_strategy = "chain_cover"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.pipeline.passes,
            vec![PassName::ExpandFilter, PassName::CreateIndices]
        );
        assert_eq!(config.pipeline.max_iterations, 100);
        assert_eq!(config.engine.num_threads, 4);
        assert_eq!(config.engine.index_strategy, IndexStrategy::ChainCover);
        assert_eq!(config.engine.parallel_threshold, 1024);
    }

    #[test]
    fn test_unknown_pass_is_rejected() {
        let error = Config::from_toml_str("[pipeline]\npasses = [\"inline_everything\"]").unwrap_err();
        assert!(matches!(error, ConfigError::Toml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("ram-config-{}.toml", std::process::id()));
        fs::write(&path, "[engine]\nprofile = true\n").unwrap();
        let config = Config::load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(config.engine.profile);
    }

    #[test]
    fn test_missing_file() {
        let error = Config::load("/nonexistent/ram.toml").unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
        assert!(error.to_string().contains("/nonexistent/ram.toml"));
    }
}
