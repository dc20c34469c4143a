//! Date-partitioned chat message archive.
//!
//! Messages are batched by a debounced [`WriteCoalescer`], grouped by UTC
//! date and merged into line-delimited JSON files through a
//! [`DirectoryCapability`], skipping identities already on disk.

pub mod archive;
pub mod capability;
pub mod coalescer;
pub mod error;
pub mod handle_store;
pub mod local;
pub mod model;
pub mod sync;
pub mod writer;

/// Archive facade.
pub use archive::MemoryArchive;
/// Capability seam and acquisition collaborators.
pub use capability::{
    AccessMode, CapabilityDescriptor, CapabilityResolver, DirectoryCapability, DirectoryPicker,
    FileSnapshot, PermissionState, PickerOptions,
};
/// Debounced write queue.
pub use coalescer::WriteCoalescer;
/// Error types.
pub use error::{ArchiveError, CapabilityError, StoreError};
/// Handle persistence and permission lifecycle.
pub use handle_store::{
    FileHandlePersistence, HANDLE_KEY, HandlePersistence, HandleRecord, HandleState, HandleStore,
};
/// Local filesystem adapter.
pub use local::{LocalDirectory, LocalResolver, PathPicker};
/// Data model.
pub use model::{ChatMessage, Conversation, DateKey, MessageRecord, Role};
/// Idempotent date-file writer.
pub use writer::AppendMergeWriter;
