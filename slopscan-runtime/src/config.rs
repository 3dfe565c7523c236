//! Runtime configuration
//!
//! Loaded from an optional TOML file; every field has a default.
//!
//! ```toml
//! [dispatcher]
//! max_concurrent = 2
//! min_text_chars = 180
//!
//! [fetch]
//! timeout_ms = 8000
//! max_bytes = 2097152
//!
//! [models]
//! default = "models/hash_nb_4096.json"
//! japanese = "models/hash_nb_4096_ja.json"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use slopscan_core::{ModelSelector, ScoringModel};
use slopscan_net::{FetchConfig, DEFAULT_MAX_BYTES, DEFAULT_TIMEOUT_MS};

/// Errors from configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Dispatcher tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Analyses allowed to run at once
    pub max_concurrent: usize,
    /// Extracted text shorter than this falls back to the snippet
    pub min_text_chars: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            min_text_chars: 180,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub timeout_ms: u64,
    pub max_bytes: usize,
    pub user_agent: Option<String>,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_bytes: DEFAULT_MAX_BYTES,
            user_agent: None,
        }
    }
}

impl FetchSection {
    pub fn to_fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout_ms: self.timeout_ms,
            max_bytes: self.max_bytes,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Model file locations
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelPaths {
    pub default: Option<PathBuf>,
    pub japanese: Option<PathBuf>,
}

impl ModelPaths {
    /// Load the configured models; unusable files become the neutral fallback
    pub fn build_selector(&self) -> ModelSelector {
        let default = match &self.default {
            Some(path) => ScoringModel::load_or_fallback(path),
            None => {
                info!("No default model configured, using fallback");
                ScoringModel::fallback()
            }
        };

        let selector = ModelSelector::new(default);
        match &self.japanese {
            Some(path) => selector.with_japanese_model(ScoringModel::load_or_fallback(path)),
            None => selector,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub dispatcher: DispatcherConfig,
    pub fetch: FetchSection,
    pub models: ModelPaths,
}

impl RuntimeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
