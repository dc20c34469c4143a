use async_trait::async_trait;
use chatmem_rs_memory::{CapabilityError, DirectoryCapability, DirectoryPicker, PickerOptions};
use parking_lot::Mutex;
use std::sync::Arc;

/// Picker that returns a fixed capability, or cancels when it has none.
#[derive(Debug, Default)]
pub struct StubPicker {
    capability: Option<Arc<dyn DirectoryCapability>>,
    fail: bool,
    seen: Mutex<Vec<PickerOptions>>,
}

impl StubPicker {
    pub fn selecting(capability: Arc<dyn DirectoryCapability>) -> Self {
        Self {
            capability: Some(capability),
            ..Self::default()
        }
    }

    pub fn cancelling() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Options passed to each `pick` call.
    pub fn seen(&self) -> Vec<PickerOptions> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl DirectoryPicker for StubPicker {
    async fn pick(
        &self,
        options: &PickerOptions,
    ) -> Result<Option<Arc<dyn DirectoryCapability>>, CapabilityError> {
        self.seen.lock().push(options.clone());
        if self.fail {
            return Err(CapabilityError::PermissionDenied("picker".to_string()));
        }
        Ok(self.capability.clone())
    }
}
