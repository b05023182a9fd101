use crate::core::expression::parse;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_THRESHOLD_RMSD: f64 = 0.08;
pub const DEFAULT_SHEET_STEP_FUNCTION: &str = "(1+x^4)/(1+x^4+x^8)";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Optional parameters of alignment-based content variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    /// Use the parallel sheet geometry instead of the antiparallel one.
    pub parallel: bool,
    /// Sizes of consecutive residue blocks; strands are paired only across neighbors.
    pub block_sizes: Option<Vec<usize>>,
    /// RMSD in nanometers at which the step function is evaluated at `x = 1`.
    pub threshold_rmsd: f64,
    /// Switching function of the placeholder `x`.
    pub step_function: String,
    pub normalize: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            block_sizes: None,
            threshold_rmsd: DEFAULT_THRESHOLD_RMSD,
            step_function: DEFAULT_SHEET_STEP_FUNCTION.to_string(),
            normalize: false,
        }
    }
}

impl ContentConfig {
    pub fn builder() -> ContentConfigBuilder {
        ContentConfigBuilder::new()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold_rmsd.is_finite() && self.threshold_rmsd > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "threshold_rmsd",
                reason: format!("must be a positive length, got {}", self.threshold_rmsd),
            });
        }
        let step = parse(&self.step_function).map_err(|e| ConfigError::InvalidParameter {
            name: "step_function",
            reason: e.to_string(),
        })?;
        let variables = step.variables();
        if !variables.contains("x") || variables.len() != 1 {
            return Err(ConfigError::InvalidParameter {
                name: "step_function",
                reason: format!(
                    "must be a function of 'x' only, found variables {:?}",
                    variables
                ),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct ContentConfigBuilder {
    parallel: Option<bool>,
    block_sizes: Option<Vec<usize>>,
    threshold_rmsd: Option<f64>,
    step_function: Option<String>,
    normalize: Option<bool>,
}

impl ContentConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }
    pub fn block_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.block_sizes = Some(sizes);
        self
    }
    pub fn threshold_rmsd(mut self, threshold: f64) -> Self {
        self.threshold_rmsd = Some(threshold);
        self
    }
    pub fn step_function(mut self, function: &str) -> Self {
        self.step_function = Some(function.to_string());
        self
    }
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = Some(normalize);
        self
    }

    pub fn build(self) -> Result<ContentConfig, ConfigError> {
        let defaults = ContentConfig::default();
        let config = ContentConfig {
            parallel: self.parallel.unwrap_or(defaults.parallel),
            block_sizes: self.block_sizes,
            threshold_rmsd: self.threshold_rmsd.unwrap_or(defaults.threshold_rmsd),
            step_function: self.step_function.unwrap_or(defaults.step_function),
            normalize: self.normalize.unwrap_or(defaults.normalize),
        };
        config.validate()?;
        Ok(config)
    }
}
