//! Facade wiring the handle store, coalescer and sync driver together.

use crate::capability::{CapabilityResolver, DirectoryPicker, PickerOptions};
use crate::coalescer::WriteCoalescer;
use crate::error::ArchiveError;
use crate::handle_store::{HandlePersistence, HandleState, HandleStore};
use crate::model::{Conversation, MessageRecord};
use crate::sync;
use chatmem_rs_config::ArchiveConfig;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Date-partitioned chat archive.
pub struct MemoryArchive {
    config: ArchiveConfig,
    handles: Arc<HandleStore>,
    coalescer: WriteCoalescer,
}

impl MemoryArchive {
    pub fn new(
        config: ArchiveConfig,
        persistence: Arc<dyn HandlePersistence>,
        resolver: Arc<dyn CapabilityResolver>,
    ) -> Self {
        let handles = Arc::new(HandleStore::new(persistence, resolver));
        let coalescer = WriteCoalescer::new(Arc::clone(&handles), &config);
        Self {
            config,
            handles,
            coalescer,
        }
    }

    /// Try to restore the previously selected directory.
    pub async fn init(&self) -> bool {
        if !self.config.enabled {
            debug!("archive disabled by config");
            return false;
        }
        self.handles.restore().await
    }

    /// First-run setup: select a directory unless one is already active.
    pub async fn auto_setup(&self, picker: &dyn DirectoryPicker) -> bool {
        if self.is_enabled() {
            return true;
        }
        self.select_directory(picker, true).await
    }

    /// Acquire a directory through `picker`, persist it and enable writes.
    ///
    /// A cancelled picker is a normal `false`.
    pub async fn select_directory(&self, picker: &dyn DirectoryPicker, auto_setup: bool) -> bool {
        if !self.config.enabled {
            return false;
        }
        let options = if auto_setup {
            PickerOptions::auto_setup(self.config.folder_name.clone())
        } else {
            PickerOptions::new(self.config.folder_name.clone())
        };
        let capability = match picker.pick(&options).await {
            Ok(Some(capability)) => capability,
            Ok(None) => {
                info!("directory selection cancelled");
                return false;
            }
            Err(err) => {
                warn!("directory selection failed: {err}");
                return false;
            }
        };
        let name = capability.name().to_string();
        if let Err(err) = self.handles.persist(capability).await {
            warn!("selected directory will not survive restart (name={name}): {err}");
        }
        info!("archive directory selected (name={name})");
        true
    }

    /// Re-request permission for a restored directory. Call only from a
    /// direct user action.
    pub async fn reconnect(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        self.handles.reconnect().await
    }

    /// Queue one message for the next flush.
    pub fn write_message(&self, message: MessageRecord) -> bool {
        self.coalescer.enqueue(message)
    }

    /// Queue every message of a conversation.
    pub fn write_chat(&self, conversation: &Conversation) -> usize {
        sync::enqueue_conversation(&self.coalescer, conversation, &self.config.default_title)
    }

    /// Backfill all conversations and flush; returns the submitted count.
    pub async fn sync_all_chats(
        &self,
        conversations: &BTreeMap<String, Conversation>,
    ) -> Result<usize, ArchiveError> {
        sync::sync_all(
            &self.coalescer,
            conversations.values(),
            &self.config.default_title,
        )
        .await
    }

    /// Flush pending writes immediately.
    pub async fn force_flush(&self) -> Result<usize, ArchiveError> {
        self.coalescer.force_flush().await
    }

    pub fn is_enabled(&self) -> bool {
        self.coalescer.is_accepting()
    }

    pub fn handle_state(&self) -> HandleState {
        self.handles.state()
    }

    /// Name of the active directory.
    pub fn directory_name(&self) -> Option<String> {
        self.handles
            .active()
            .map(|capability| capability.name().to_string())
    }

    pub fn pending_len(&self) -> usize {
        self.coalescer.pending_len()
    }
}
