//! Capability backends.
//!
//! Backends provide the root [`DirectoryHandle`](crate::vfs::DirectoryHandle)
//! that a storage grant hands out.

mod local;
mod memory;

pub use local::{LocalBackend, LocalDir, LocalFile};
pub use memory::{MemoryBackend, MemoryDir, MemoryFile};
