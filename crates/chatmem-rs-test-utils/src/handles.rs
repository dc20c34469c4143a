use async_trait::async_trait;
use chatmem_rs_memory::{
    CapabilityDescriptor, CapabilityError, CapabilityResolver, DirectoryCapability,
    HandlePersistence, HandleRecord, StoreError,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

/// Handle persistence held in memory.
#[derive(Debug, Default)]
pub struct MemoryHandleStore {
    records: Mutex<HashMap<String, HandleRecord>>,
    failing: bool,
}

impl MemoryHandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose reads and writes always fail.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn record(&self, key: &str) -> Option<HandleRecord> {
        self.records.lock().get(key).cloned()
    }
}

#[async_trait]
impl HandlePersistence for MemoryHandleStore {
    async fn get(&self, key: &str) -> Result<Option<HandleRecord>, StoreError> {
        if self.failing {
            return Err(StoreError::Io(io::Error::other("store unavailable")));
        }
        Ok(self.records.lock().get(key).cloned())
    }

    async fn put(&self, record: HandleRecord) -> Result<(), StoreError> {
        if self.failing {
            return Err(StoreError::Io(io::Error::other("store unavailable")));
        }
        self.records.lock().insert(record.id.clone(), record);
        Ok(())
    }
}

/// Resolver that hands back one fixed capability for every descriptor.
#[derive(Debug, Clone)]
pub struct StubResolver {
    capability: Arc<dyn DirectoryCapability>,
}

impl StubResolver {
    pub fn new(capability: Arc<dyn DirectoryCapability>) -> Self {
        Self { capability }
    }
}

impl CapabilityResolver for StubResolver {
    fn resolve(
        &self,
        _descriptor: &CapabilityDescriptor,
    ) -> Result<Arc<dyn DirectoryCapability>, CapabilityError> {
        Ok(Arc::clone(&self.capability))
    }
}
