//! Config failures, each naming the file or setting at fault.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists in the layer stack but could not be read.
    #[error("cannot read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{layer} is not valid JSON5: {source}")]
    ParseFailed {
        layer: String,
        #[source]
        source: json5::Error,
    },
    /// Merged values did not deserialize into [`crate::ChatmemConfig`].
    #[error("config does not fit the chatmem model: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A layer carries an unknown key or a value of the wrong type.
    #[error("{layer}: `{path}` {message}")]
    InvalidField {
        layer: String,
        path: String,
        message: String,
    },
    /// A well-typed setting the archive cannot work with.
    #[error("`{setting}` {message}")]
    InvalidValue {
        setting: &'static str,
        message: String,
    },
}
