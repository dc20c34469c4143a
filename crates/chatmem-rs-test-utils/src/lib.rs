//! Test helpers shared across chatmem crates.

pub mod directory;
pub mod fixtures;
pub mod handles;
pub mod picker;

pub use directory::MemoryDirectory;
pub use fixtures::{DAY_ONE_MS, DAY_TWO_MS, conversation, message};
pub use handles::{MemoryHandleStore, StubResolver};
pub use picker::StubPicker;
