//! Workspace configuration (`sprig.toml`)

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use sprig_core::LayoutConfig;

use crate::parser::DEFAULT_CACHE_CAPACITY;

/// Config file looked up at the workspace root.
pub const CONFIG_FILE: &str = "sprig.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid sprig.toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid ignore pattern `{pattern}`: {source}")]
    Glob {
        pattern: String,
        source: globset::Error,
    },
}

/// Sprig workspace configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprigConfig {
    /// Overrides for node sizing and placement metrics.
    pub layout: LayoutConfig,

    /// Glob patterns (relative to the root) never loaded as source files.
    pub ignore: Vec<String>,

    /// Distinct texts kept by the parse cache; 0 disables caching.
    pub parse_cache_capacity: usize,
}

impl Default for SprigConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            ignore: vec!["node_modules/**".to_string(), "dist/**".to_string()],
            parse_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl SprigConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load `sprig.toml` from `root`. A missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::from_toml(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Compile the ignore patterns.
    pub fn ignore_set(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| ConfigError::Glob {
            pattern: self.ignore.join(", "),
            source,
        })
    }
}
