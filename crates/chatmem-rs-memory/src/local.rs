//! Local filesystem capability adapter.

use crate::capability::{
    AccessMode, CapabilityDescriptor, CapabilityResolver, DirectoryCapability, DirectoryPicker,
    FileSnapshot, PermissionState, PickerOptions,
};
use crate::error::CapabilityError;
use async_trait::async_trait;
use log::{debug, info};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Descriptor kind for local directories.
pub const LOCAL_KIND: &str = "local";

/// Capability over a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    root: PathBuf,
    name: String,
}

impl LocalDirectory {
    /// Wrap a directory path. The directory need not exist yet.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let name = root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| root.display().to_string());
        Self { root, name }
    }

    /// Directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a file name inside the root, rejecting anything but a single
    /// normal component.
    fn file_path(&self, name: &str) -> Result<PathBuf, CapabilityError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
            _ => Err(CapabilityError::InvalidName(name.to_string())),
        }
    }

    async fn permission(&self, mode: AccessMode) -> Result<PermissionState, CapabilityError> {
        let metadata = match fs::metadata(&self.root).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PermissionState::Prompt),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Ok(PermissionState::Denied);
            }
            Err(err) => return Err(err.into()),
        };
        if !metadata.is_dir() {
            return Ok(PermissionState::Denied);
        }
        if mode == AccessMode::ReadWrite && metadata.permissions().readonly() {
            return Ok(PermissionState::Denied);
        }
        Ok(PermissionState::Granted)
    }
}

#[async_trait]
impl DirectoryCapability for LocalDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            kind: LOCAL_KIND.to_string(),
            location: self.root.to_string_lossy().to_string(),
            name: self.name.clone(),
        }
    }

    async fn open_file(&self, name: &str, create: bool) -> Result<FileSnapshot, CapabilityError> {
        let path = self.file_path(name)?;
        let metadata = if create {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.metadata().await?
        } else {
            match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return Err(CapabilityError::NotFound(name.to_string()));
                }
                Err(err) => return Err(err.into()),
            }
        };
        Ok(FileSnapshot {
            name: name.to_string(),
            size: metadata.len(),
        })
    }

    async fn read_text(&self, file: &FileSnapshot) -> Result<String, CapabilityError> {
        let bytes = fs::read(self.file_path(&file.name)?).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write_at(
        &self,
        file: &FileSnapshot,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), CapabilityError> {
        let path = self.file_path(&file.name)?;
        let mut handle = OpenOptions::new().write(true).open(&path).await?;
        handle.seek(SeekFrom::Start(offset)).await?;
        handle.write_all(bytes).await?;
        handle.flush().await?;
        handle.sync_data().await?;
        debug!(
            "local write (file={}, offset={}, bytes={})",
            file.name,
            offset,
            bytes.len()
        );
        Ok(())
    }

    async fn query_permission(&self, mode: AccessMode) -> Result<PermissionState, CapabilityError> {
        self.permission(mode).await
    }

    /// Creates the directory when it is missing.
    async fn request_permission(
        &self,
        mode: AccessMode,
    ) -> Result<PermissionState, CapabilityError> {
        if self.permission(mode).await? == PermissionState::Prompt {
            fs::create_dir_all(&self.root).await?;
            info!("created archive directory (path={})", self.root.display());
        }
        self.permission(mode).await
    }
}

/// Resolves `local` descriptors into [`LocalDirectory`] capabilities.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalResolver;

impl CapabilityResolver for LocalResolver {
    fn resolve(
        &self,
        descriptor: &CapabilityDescriptor,
    ) -> Result<Arc<dyn DirectoryCapability>, CapabilityError> {
        if descriptor.kind != LOCAL_KIND {
            return Err(CapabilityError::Unsupported(descriptor.kind.clone()));
        }
        Ok(Arc::new(LocalDirectory::new(&descriptor.location)))
    }
}

/// Headless picker that hands out a preconfigured directory.
///
/// With no directory configured it behaves like a cancelled dialog.
#[derive(Debug, Default, Clone)]
pub struct PathPicker {
    path: Option<PathBuf>,
}

impl PathPicker {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DirectoryPicker for PathPicker {
    async fn pick(
        &self,
        options: &PickerOptions,
    ) -> Result<Option<Arc<dyn DirectoryCapability>>, CapabilityError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(None);
        };
        let directory = LocalDirectory::new(path);
        if directory.request_permission(options.mode).await? != PermissionState::Granted {
            return Err(CapabilityError::PermissionDenied(path.display().to_string()));
        }
        Ok(Some(Arc::new(directory)))
    }
}
