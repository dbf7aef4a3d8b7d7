//! Engine configuration
//!
//! Loaded from a YAML file with camelCase keys:
//!
//! ```yaml
//! staticPath: /srv/static
//! strict: true
//! maxIncludeDepth: 1000
//! keepEmptyDocuments: false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Default bound on re-entrant `include` calls per template name
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Base directory for `Files()`; unset means every asset read fails
    #[serde(rename = "staticPath", skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,

    /// Undefined variables are errors
    pub strict: bool,

    pub max_include_depth: usize,

    /// Keep rendered documents that parse to an empty mapping
    pub keep_empty_documents: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            static_dir: None,
            strict: true,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            keep_empty_documents: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::io(path.display().to_string(), e))?;
        let config = Self::from_yaml(&content).map_err(|message| EngineError::Config {
            path: path.display().to_string(),
            message,
        })?;
        tracing::debug!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    fn from_yaml(content: &str) -> std::result::Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }
}
