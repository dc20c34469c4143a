//! Persistence and permission lifecycle for the archive directory handle.

use crate::capability::{
    AccessMode, CapabilityDescriptor, CapabilityResolver, DirectoryCapability, PermissionState,
};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::BaseDirs;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fixed record key for the archive directory.
pub const HANDLE_KEY: &str = "memoryDir";

const HANDLE_FILENAME: &str = "handles.json";

/// Persisted handle record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandleRecord {
    /// Record key.
    pub id: String,
    /// Capability identity.
    pub descriptor: CapabilityDescriptor,
    /// When the handle was stored.
    pub saved_at: DateTime<Utc>,
}

/// Key-value store for handle records that survives restarts.
#[async_trait]
pub trait HandlePersistence: Send + Sync {
    /// Fetch a record by key.
    async fn get(&self, key: &str) -> Result<Option<HandleRecord>, StoreError>;
    /// Insert or replace a record under its `id`.
    async fn put(&self, record: HandleRecord) -> Result<(), StoreError>;
}

/// Handle records kept in a single JSON object file.
#[derive(Debug)]
pub struct FileHandlePersistence {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHandlePersistence {
    /// Create a store backed by the given file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store under `~/.chatmem/handles.json`, falling back to the cwd.
    pub fn load_default() -> Result<Self, StoreError> {
        Ok(Self::new(default_handle_path()?))
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, HandleRecord>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, records: &BTreeMap<String, HandleRecord>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            serde_json::to_writer_pretty(&mut file, records)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(temp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl HandlePersistence for FileHandlePersistence {
    async fn get(&self, key: &str) -> Result<Option<HandleRecord>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    async fn put(&self, record: HandleRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut records = match self.read_all() {
            Ok(records) => records,
            Err(StoreError::Serde(err)) => {
                warn!(
                    "discarding unreadable handle file (path={}): {err}",
                    self.path.display()
                );
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        debug!(
            "persisting handle (key={}, kind={})",
            record.id, record.descriptor.kind
        );
        records.insert(record.id.clone(), record);
        self.write_all(&records)
    }
}

fn default_handle_path() -> Result<PathBuf, StoreError> {
    if let Some(home) = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()) {
        return Ok(home.join(".chatmem").join(HANDLE_FILENAME));
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".chatmem").join(HANDLE_FILENAME))
}

/// Where the archive handle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// No capability known.
    Missing,
    /// A capability was restored but permission must be re-requested.
    Pending,
    /// Writes may proceed.
    Active,
}

#[derive(Debug, Default)]
struct HandleSlots {
    active: Option<Arc<dyn DirectoryCapability>>,
    pending: Option<Arc<dyn DirectoryCapability>>,
}

/// Tracks the active and pending directory capability.
pub struct HandleStore {
    persistence: Arc<dyn HandlePersistence>,
    resolver: Arc<dyn CapabilityResolver>,
    slots: RwLock<HandleSlots>,
}

impl HandleStore {
    pub fn new(
        persistence: Arc<dyn HandlePersistence>,
        resolver: Arc<dyn CapabilityResolver>,
    ) -> Self {
        Self {
            persistence,
            resolver,
            slots: RwLock::new(HandleSlots::default()),
        }
    }

    /// Load the persisted capability and activate it if permission is
    /// still granted.
    ///
    /// Storage and resolution errors are logged and reported as `false`.
    pub async fn restore(&self) -> bool {
        let record = match self.persistence.get(HANDLE_KEY).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("no persisted handle (key={HANDLE_KEY})");
                return false;
            }
            Err(err) => {
                warn!("failed to read persisted handle: {err}");
                return false;
            }
        };
        let capability = match self.resolver.resolve(&record.descriptor) {
            Ok(capability) => capability,
            Err(err) => {
                warn!(
                    "failed to resolve persisted handle (kind={}): {err}",
                    record.descriptor.kind
                );
                return false;
            }
        };
        let permission = match capability.query_permission(AccessMode::ReadWrite).await {
            Ok(permission) => permission,
            Err(err) => {
                warn!("failed to query handle permission: {err}");
                return false;
            }
        };

        let mut slots = self.slots.write();
        if permission == PermissionState::Granted {
            info!("restored archive directory (name={})", capability.name());
            slots.active = Some(capability);
            slots.pending = None;
            true
        } else {
            info!(
                "archive directory needs permission (name={}, state={:?})",
                capability.name(),
                permission
            );
            slots.pending = Some(capability);
            false
        }
    }

    /// Re-request permission for a pending capability.
    ///
    /// Callers must only invoke this in direct response to a user action.
    pub async fn reconnect(&self) -> bool {
        let pending = {
            let slots = self.slots.read();
            if slots.active.is_some() {
                return true;
            }
            match slots.pending.clone() {
                Some(pending) => pending,
                None => return false,
            }
        };
        match pending.request_permission(AccessMode::ReadWrite).await {
            Ok(PermissionState::Granted) => {
                let mut slots = self.slots.write();
                slots.active = Some(pending);
                slots.pending = None;
                info!("reconnected archive directory");
                true
            }
            Ok(state) => {
                debug!("reconnect declined (state={state:?})");
                false
            }
            Err(err) => {
                warn!("reconnect failed: {err}");
                false
            }
        }
    }

    /// Activate a freshly acquired capability and persist it.
    ///
    /// The capability stays active for this process even when persisting
    /// fails; the error is returned so the caller can report it.
    pub async fn persist(
        &self,
        capability: Arc<dyn DirectoryCapability>,
    ) -> Result<(), StoreError> {
        let record = HandleRecord {
            id: HANDLE_KEY.to_string(),
            descriptor: capability.descriptor(),
            saved_at: Utc::now(),
        };
        {
            let mut slots = self.slots.write();
            slots.active = Some(capability);
            slots.pending = None;
        }
        self.persistence.put(record).await
    }

    /// Capability writes should go through, if any.
    pub fn active(&self) -> Option<Arc<dyn DirectoryCapability>> {
        self.slots.read().active.clone()
    }

    pub fn is_active(&self) -> bool {
        self.slots.read().active.is_some()
    }

    pub fn state(&self) -> HandleState {
        let slots = self.slots.read();
        if slots.active.is_some() {
            HandleState::Active
        } else if slots.pending.is_some() {
            HandleState::Pending
        } else {
            HandleState::Missing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FileHandlePersistence, HANDLE_KEY, HandlePersistence, HandleRecord};
    use crate::capability::CapabilityDescriptor;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn record(location: &str) -> HandleRecord {
        HandleRecord {
            id: HANDLE_KEY.to_string(),
            descriptor: CapabilityDescriptor {
                kind: "local".to_string(),
                location: location.to_string(),
                name: "memory".to_string(),
            },
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn file_persistence_replaces_record_under_key() {
        let temp = tempdir().expect("tempdir");
        let store = FileHandlePersistence::new(temp.path().join("nested").join("handles.json"));
        assert_eq!(store.get(HANDLE_KEY).await.expect("get"), None);

        store.put(record("/a")).await.expect("put a");
        let second = record("/b");
        store.put(second.clone()).await.expect("put b");

        let reopened = FileHandlePersistence::new(store.path());
        assert_eq!(reopened.get(HANDLE_KEY).await.expect("get"), Some(second));
        assert_eq!(reopened.get("other").await.expect("get other"), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("handles.json");
        std::fs::write(&path, "{not json").expect("write");
        let store = FileHandlePersistence::new(&path);
        assert!(store.get(HANDLE_KEY).await.is_err());
    }

    #[tokio::test]
    async fn put_rewrites_corrupt_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("handles.json");
        std::fs::write(&path, "{torn").expect("write");
        let store = FileHandlePersistence::new(&path);

        let fresh = record("/c");
        store.put(fresh.clone()).await.expect("put over corrupt file");
        assert_eq!(store.get(HANDLE_KEY).await.expect("get"), Some(fresh));
    }
}
