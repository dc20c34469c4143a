//! Configuration schema for chatmem.

use serde::{Deserialize, Serialize};

/// Root of `chatmem.json5`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatmemConfig {
    /// Editor schema hint; ignored by the loader.
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub handles: HandleStoreConfig,
}

impl ChatmemConfig {
    pub fn builder() -> ChatmemConfigBuilder {
        ChatmemConfigBuilder::default()
    }
}

/// Programmatic construction for hosts that do not read config files.
///
/// The result is not validated; call [`ChatmemConfig::validate`] when the
/// values come from user input.
#[derive(Debug, Default, Clone)]
pub struct ChatmemConfigBuilder {
    config: ChatmemConfig,
}

impl ChatmemConfigBuilder {
    pub fn archive(mut self, archive: ArchiveConfig) -> Self {
        self.config.archive = archive;
        self
    }

    pub fn handles(mut self, handles: HandleStoreConfig) -> Self {
        self.config.handles = handles;
        self
    }

    pub fn build(self) -> ChatmemConfig {
        self.config
    }
}

/// Settings for the date-partitioned message archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Master switch; a disabled archive never touches the filesystem.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Directory offered by the headless path picker.
    #[serde(default)]
    pub directory: Option<String>,
    /// Folder name suggested to interactive pickers.
    #[serde(default = "default_folder_name")]
    pub folder_name: String,
    /// Quiet period before pending writes are flushed.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Extension used for date files.
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// Title recorded for conversations without one.
    #[serde(default = "default_title")]
    pub default_title: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            directory: None,
            folder_name: default_folder_name(),
            debounce_ms: default_debounce_ms(),
            file_extension: default_file_extension(),
            default_title: default_title(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_folder_name() -> String {
    "chatmem-memory".to_string()
}

/// Default debounce window in milliseconds.
fn default_debounce_ms() -> u64 {
    1000
}

fn default_file_extension() -> String {
    "jsonl".to_string()
}

fn default_title() -> String {
    "Untitled".to_string()
}

/// Location of the persisted directory handle record.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HandleStoreConfig {
    /// Path to the handle file; defaults to `~/.chatmem/handles.json`.
    #[serde(default)]
    pub path: Option<String>,
}
