use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILTERS, DEFAULT_MAX_INPUT_BYTES, DEFAULT_PROBLEM_STATUS,
    DEFAULT_PROBLEM_TITLE, DEFAULT_PROBLEM_TYPE, ENV_CONFIG, ENV_MAX_DEPTH, ENV_MAX_FILTERS,
    ENV_MAX_INPUT_BYTES,
};

// =============================================================================
// Validation Mode
// =============================================================================

/// How many errors validation collects before giving up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Stop at the first invalid leaf
    #[default]
    FailFast,
    /// Report every invalid leaf in the tree
    Exhaustive,
}

// =============================================================================
// Sections
// =============================================================================

/// Parser limits applied to untrusted input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_input_bytes: usize,
    pub max_filters: usize,
    pub max_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_filters: DEFAULT_MAX_FILTERS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Fixed parts of every error report
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub type_uri: String,
    pub title: String,
    pub status_code: u16,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            type_uri: DEFAULT_PROBLEM_TYPE.to_string(),
            title: DEFAULT_PROBLEM_TITLE.to_string(),
            status_code: DEFAULT_PROBLEM_STATUS,
        }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: LimitsConfig,
    pub report: ReportConfig,
    pub validation_mode: ValidationMode,
}

impl EngineConfig {
    /// Load configuration.
    ///
    /// Priority: explicit path > `FILTER_ENGINE_CONFIG` > defaults. Limit
    /// environment variables are applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;

        tracing::debug!(
            max_filters = config.limits.max_filters,
            max_depth = config.limits.max_depth,
            max_input_bytes = config.limits.max_input_bytes,
            mode = ?config.validation_mode,
            "Loaded filter engine config"
        );
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_usize(ENV_MAX_FILTERS)? {
            self.limits.max_filters = value;
        }
        if let Some(value) = env_usize(ENV_MAX_DEPTH)? {
            self.limits.max_depth = value;
        }
        if let Some(value) = env_usize(ENV_MAX_INPUT_BYTES)? {
            self.limits.max_input_bytes = value;
        }
        Ok(())
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(None),
    }
}
