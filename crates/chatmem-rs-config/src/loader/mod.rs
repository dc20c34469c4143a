//! Layered configuration loader.
//!
//! Reads `chatmem.json5` from the home config dir and the working directory,
//! then any runtime override files, checks each layer's shape, merges them in
//! that order and validates the result.

mod layers;
mod merge;
mod schema;


use crate::{ChatmemConfig, ConfigError};
use log::{debug, info};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Longest accepted quiet period before a flush.
const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Effective config plus the layers it was built from.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: ChatmemConfig,
    /// Layers that were found and applied, lowest precedence first.
    pub layers: Vec<ConfigLayer>,
}

/// Where a layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// `~/.chatmem/chatmem.json5`.
    User,
    /// `chatmem.json5` in the working directory.
    Cwd,
    /// Explicit override file; applied last.
    Runtime,
}

#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

/// Inputs for [`ChatmemConfig::load_layered_with_options`].
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    pub cwd: PathBuf,
    /// User layer location; `None` skips the layer.
    pub user_config_path: Option<PathBuf>,
    /// Override files, each of which must exist.
    pub runtime_paths: Vec<PathBuf>,
}

impl LayeredConfigOptions {
    /// Default user layer location and no overrides.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            user_config_path: layers::home_config_path(),
            runtime_paths: Vec::new(),
        }
    }

    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl ChatmemConfig {
    /// Load one file on its own, without the layer stack.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config file (path={})", path.display());
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let label = path.display().to_string();
        let value = layers::parse_json5(&contents, &label)?;
        schema::check_layer(&value, &label)?;
        Self::from_merged(value)
    }

    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        let value = layers::parse_json5(contents, "inline")?;
        schema::check_layer(&value, "inline")?;
        Self::from_merged(value)
    }

    /// Load the default stack for `cwd`.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load user, cwd and runtime layers, in rising precedence.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let stack = layers::read_stack(&options)?;
        let mut merged = Value::Object(serde_json::Map::new());
        let mut applied = Vec::with_capacity(stack.len());
        for layer in stack {
            debug!(
                "applying config layer (source={}, path={})",
                layer.meta.source,
                layer.meta.path.display()
            );
            merge::overlay(&mut merged, layer.value);
            applied.push(layer.meta);
        }
        let config = Self::from_merged(merged)?;
        info!(
            "config loaded (layers={}, archive_enabled={})",
            applied.len(),
            config.archive.enabled
        );
        Ok(LayeredConfig {
            config,
            layers: applied,
        })
    }

    /// Check settings that are well-typed but unusable by the archive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let archive = &self.archive;
        let extension = archive.file_extension.as_str();
        if extension.is_empty() || extension.contains(&['.', '/', '\\'][..]) {
            return Err(ConfigError::InvalidValue {
                setting: "archive.file_extension",
                message: format!("must be a bare extension such as \"jsonl\", got {extension:?}"),
            });
        }
        if archive.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::InvalidValue {
                setting: "archive.debounce_ms",
                message: format!("must not exceed {MAX_DEBOUNCE_MS}"),
            });
        }
        if archive.default_title.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                setting: "archive.default_title",
                message: "must not be blank".to_string(),
            });
        }
        Ok(())
    }

    fn from_merged(value: Value) -> Result<Self, ConfigError> {
        let config: ChatmemConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }
}
