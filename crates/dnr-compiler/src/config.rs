use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use dnr_core::types::{ResourceType, ResourceTypeMask};

use crate::emitter::{default_resource_types, DEFAULT_BATCH_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("batch_size must be at least 1")]
    InvalidBatchSize,
}

/// Compiler settings. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Rules per registration call
    pub batch_size: usize,
    /// Types for network rules that name none
    pub default_resource_types: Vec<ResourceType>,
    /// Domains that always get an allow rule
    pub whitelist: Vec<String>,
    pub whitelist_resource_types: Vec<ResourceType>,
    /// Hard ceiling on emitted network rules; the lowest-priority tail is cut
    pub max_rules: Option<usize>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            default_resource_types: default_resource_types().types().collect(),
            whitelist: Vec::new(),
            whitelist_resource_types: vec![ResourceType::MainFrame, ResourceType::SubFrame],
            max_rules: None,
        }
    }
}

impl CompilerConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        Ok(())
    }

    pub fn default_type_mask(&self) -> ResourceTypeMask {
        self.default_resource_types.iter().copied().collect()
    }

    pub fn whitelist_type_mask(&self) -> ResourceTypeMask {
        self.whitelist_resource_types.iter().copied().collect()
    }
}
