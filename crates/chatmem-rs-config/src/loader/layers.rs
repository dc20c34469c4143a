//! Locating and reading the JSON5 files that make up the config stack.

use super::{ConfigLayer, ConfigLayerSource, LayeredConfigOptions, schema};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File name looked up in the home config dir and the working directory.
pub(super) const CONFIG_FILE: &str = "chatmem.json5";
const HOME_CONFIG_DIR: &str = ".chatmem";

/// A parsed, schema-checked layer.
#[derive(Debug)]
pub(super) struct RawLayer {
    pub(super) meta: ConfigLayer,
    pub(super) value: Value,
}

impl fmt::Display for ConfigLayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Runtime => "runtime",
        })
    }
}

/// `~/.chatmem/chatmem.json5`, when a home directory is known.
pub(super) fn home_config_path() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| dirs.home_dir().join(HOME_CONFIG_DIR).join(CONFIG_FILE))
}

/// Read every layer in precedence order, lowest first.
///
/// User and cwd files are optional and a file reachable through both is read
/// once. Runtime files must exist.
pub(super) fn read_stack(options: &LayeredConfigOptions) -> Result<Vec<RawLayer>, ConfigError> {
    let cwd = match options.cwd.canonicalize() {
        Ok(cwd) => cwd,
        Err(err) if err.kind() == ErrorKind::NotFound => options.cwd.clone(),
        Err(source) => {
            return Err(ConfigError::ReadFailed {
                path: options.cwd.clone(),
                source,
            });
        }
    };

    let mut seen = HashSet::new();
    let mut stack = Vec::new();
    let optional = [
        (ConfigLayerSource::User, options.user_config_path.clone()),
        (ConfigLayerSource::Cwd, Some(cwd.join(CONFIG_FILE))),
    ];
    for (source, path) in optional {
        let Some(path) = path.filter(|path| path.is_file()) else {
            debug!("config layer absent (source={source})");
            continue;
        };
        let identity = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !seen.insert(identity) {
            debug!("config layer already read (source={source}, path={})", path.display());
            continue;
        }
        stack.push(read_layer(source, &path)?);
    }
    for path in &options.runtime_paths {
        stack.push(read_layer(ConfigLayerSource::Runtime, path)?);
    }
    Ok(stack)
}

fn read_layer(source: ConfigLayerSource, path: &Path) -> Result<RawLayer, ConfigError> {
    let label = format!("{source}({})", path.display());
    debug!("reading config layer (layer={label})");
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let value = parse_json5(&contents, &label)?;
    schema::check_layer(&value, &label)?;
    Ok(RawLayer {
        meta: ConfigLayer {
            source,
            path: path.to_path_buf(),
        },
        value,
    })
}

pub(super) fn parse_json5(contents: &str, label: &str) -> Result<Value, ConfigError> {
    json5::from_str(contents).map_err(|source| ConfigError::ParseFailed {
        layer: label.to_string(),
        source,
    })
}
