use async_trait::async_trait;
use chatmem_rs_memory::{
    AccessMode, CapabilityDescriptor, CapabilityError, DirectoryCapability, FileSnapshot,
    PermissionState,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;

/// In-memory directory with scripted permissions and failure injection.
#[derive(Debug)]
pub struct MemoryDirectory {
    name: String,
    state: Mutex<DirectoryState>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    files: BTreeMap<String, Vec<u8>>,
    query_result: Option<PermissionState>,
    request_result: Option<PermissionState>,
    failing_writes: usize,
    writes_before_failure: usize,
    opens: usize,
    writes: usize,
    permission_requests: usize,
}

impl MemoryDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(DirectoryState {
                query_result: Some(PermissionState::Granted),
                request_result: Some(PermissionState::Granted),
                ..DirectoryState::default()
            }),
        }
    }

    /// Permission reported by `query_permission`.
    pub fn with_query_permission(self, permission: PermissionState) -> Self {
        self.state.lock().query_result = Some(permission);
        self
    }

    /// Permission granted by `request_permission`.
    pub fn with_request_permission(self, permission: PermissionState) -> Self {
        self.state.lock().request_result = Some(permission);
        self
    }

    /// Make permission queries fail with an IO error.
    pub fn with_failing_query(self) -> Self {
        self.state.lock().query_result = None;
        self
    }

    /// Seed a file with raw content.
    pub fn with_file(self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.state.lock().files.insert(name.into(), content.into());
        self
    }

    /// Fail the next `count` writes.
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_writes_after(0, count);
    }

    /// Let `successes` writes through, then fail the following `count`.
    pub fn fail_writes_after(&self, successes: usize, count: usize) {
        let mut state = self.state.lock();
        state.writes_before_failure = successes;
        state.failing_writes = count;
    }

    pub fn file(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .files
            .get(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn file_names(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }

    /// Non-empty lines across all files.
    pub fn line_count(&self) -> usize {
        self.state
            .lock()
            .files
            .values()
            .map(|bytes| {
                String::from_utf8_lossy(bytes)
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .count()
            })
            .sum()
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn writes(&self) -> usize {
        self.state.lock().writes
    }

    pub fn permission_requests(&self) -> usize {
        self.state.lock().permission_requests
    }
}

#[async_trait]
impl DirectoryCapability for MemoryDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            kind: "memory".to_string(),
            location: format!("memory://{}", self.name),
            name: self.name.clone(),
        }
    }

    async fn open_file(&self, name: &str, create: bool) -> Result<FileSnapshot, CapabilityError> {
        let mut state = self.state.lock();
        state.opens += 1;
        let size = match state.files.get(name).map(|bytes| bytes.len() as u64) {
            Some(size) => size,
            None if create => {
                state.files.insert(name.to_string(), Vec::new());
                0
            }
            None => return Err(CapabilityError::NotFound(name.to_string())),
        };
        Ok(FileSnapshot {
            name: name.to_string(),
            size,
        })
    }

    async fn read_text(&self, file: &FileSnapshot) -> Result<String, CapabilityError> {
        self.file(&file.name)
            .ok_or_else(|| CapabilityError::NotFound(file.name.clone()))
    }

    async fn write_at(
        &self,
        file: &FileSnapshot,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), CapabilityError> {
        let mut state = self.state.lock();
        if state.failing_writes > 0 {
            if state.writes_before_failure > 0 {
                state.writes_before_failure -= 1;
            } else {
                state.failing_writes -= 1;
                return Err(CapabilityError::Io(io::Error::other("injected write failure")));
            }
        }
        state.writes += 1;
        let content = state
            .files
            .get_mut(&file.name)
            .ok_or_else(|| CapabilityError::NotFound(file.name.clone()))?;
        let offset = offset as usize;
        let end = offset + bytes.len();
        if content.len() < end {
            content.resize(end, 0);
        }
        content[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    async fn query_permission(
        &self,
        _mode: AccessMode,
    ) -> Result<PermissionState, CapabilityError> {
        self.state
            .lock()
            .query_result
            .ok_or_else(|| CapabilityError::Io(io::Error::other("permission query failed")))
    }

    async fn request_permission(
        &self,
        _mode: AccessMode,
    ) -> Result<PermissionState, CapabilityError> {
        let mut state = self.state.lock();
        state.permission_requests += 1;
        let granted = state.request_result.unwrap_or(PermissionState::Denied);
        if granted == PermissionState::Granted {
            state.query_result = Some(PermissionState::Granted);
        }
        Ok(granted)
    }
}
