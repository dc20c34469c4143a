//! Settings for the chatmem archive and the CLI that hosts it.
//!
//! [`ChatmemConfig`] is read from JSON5 layers (home, working directory,
//! explicit overrides), shape-checked per layer and validated once merged.

mod error;
mod loader;
mod model;

pub use error::ConfigError;
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
pub use model::*;
