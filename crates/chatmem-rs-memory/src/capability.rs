//! Directory capability interface and acquisition collaborators.

use crate::error::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Access level asked of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

/// Permission level reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Operations may proceed.
    Granted,
    /// The host would ask the user; only a direct user action may request it.
    Prompt,
    /// The host refuses access.
    Denied,
}

/// A file opened through a capability, with its size at open time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub name: String,
    pub size: u64,
}

/// Serializable identity of a capability, used to persist and restore it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    /// Adapter kind, e.g. `local`.
    pub kind: String,
    /// Adapter-specific location.
    pub location: String,
    /// Display name.
    pub name: String,
}

/// Scoped, permissioned access to one storage directory.
#[async_trait]
pub trait DirectoryCapability: Send + Sync + Debug {
    /// Display name of the directory.
    fn name(&self) -> &str;

    /// Identity used for persistence.
    fn descriptor(&self) -> CapabilityDescriptor;

    /// Open a file by name, creating it when `create` is set.
    async fn open_file(&self, name: &str, create: bool) -> Result<FileSnapshot, CapabilityError>;

    /// Read the full content of a file as text.
    async fn read_text(&self, file: &FileSnapshot) -> Result<String, CapabilityError>;

    /// Write bytes starting at `offset`, keeping all existing data.
    async fn write_at(
        &self,
        file: &FileSnapshot,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), CapabilityError>;

    /// Current permission without prompting.
    async fn query_permission(&self, mode: AccessMode) -> Result<PermissionState, CapabilityError>;

    /// Ask the host for permission. Only valid in response to a user action.
    async fn request_permission(
        &self,
        mode: AccessMode,
    ) -> Result<PermissionState, CapabilityError>;
}

/// Rebuilds a live capability from a persisted descriptor.
pub trait CapabilityResolver: Send + Sync {
    fn resolve(
        &self,
        descriptor: &CapabilityDescriptor,
    ) -> Result<Arc<dyn DirectoryCapability>, CapabilityError>;
}

/// Hints passed to a directory picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOptions {
    /// Remembered picker id so hosts can reopen in the same place.
    pub id: String,
    pub mode: AccessMode,
    /// Well-known starting location, e.g. `downloads`.
    pub start_in: Option<String>,
}

impl PickerOptions {
    /// Options for an explicit user-driven selection.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mode: AccessMode::ReadWrite,
            start_in: None,
        }
    }

    /// Options for first-run setup, starting in the downloads folder.
    pub fn auto_setup(id: impl Into<String>) -> Self {
        Self {
            start_in: Some("downloads".to_string()),
            ..Self::new(id)
        }
    }
}

/// Acquires a new capability, typically through a user-facing dialog.
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    /// Returns `None` when the user cancels.
    async fn pick(
        &self,
        options: &PickerOptions,
    ) -> Result<Option<Arc<dyn DirectoryCapability>>, CapabilityError>;
}
