//! Storage capabilities.
//!
//! A capability is an opaque handle to one directory or file inside the
//! granted storage root. Capabilities are only obtained by walking from a
//! root directory handle one name at a time; there is no way to open an
//! arbitrary path directly.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use super::error::FsResult;
use super::types::EntryKind;

/// Kind of a child handle.
pub type HandleKind = EntryKind;

/// A named child of a directory capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleEntry {
    pub name: String,
    pub kind: HandleKind,
}

impl HandleEntry {
    pub fn new(name: impl Into<String>, kind: HandleKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Attributes reported by a capability itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleMeta {
    pub kind: HandleKind,
    /// Byte length; 0 for directories.
    pub size: u64,
    /// Last modification, milliseconds since the Unix epoch, if the
    /// backing storage reports one.
    pub modified: Option<i64>,
}

/// Capability for a directory.
#[async_trait]
pub trait DirectoryHandle: Send + Sync + Debug {
    /// Name of this directory within its parent (empty for a root).
    fn name(&self) -> &str;

    /// Acquire the child directory `name`, creating it if `create`.
    ///
    /// Fails `NotFound` if absent and `create` is false, and
    /// `TypeMismatch` if `name` is a file.
    async fn get_directory(&self, name: &str, create: bool) -> FsResult<Arc<dyn DirectoryHandle>>;

    /// Acquire the child file `name`, creating an empty one if `create`.
    ///
    /// Fails `NotFound` if absent and `create` is false, and
    /// `TypeMismatch` if `name` is a directory.
    async fn get_file(&self, name: &str, create: bool) -> FsResult<Arc<dyn FileHandle>>;

    /// Kind of the child `name`, or `None` if there is no such child.
    async fn kind_of(&self, name: &str) -> FsResult<Option<HandleKind>>;

    /// Direct children, sorted by name.
    async fn entries(&self) -> FsResult<Vec<HandleEntry>>;

    /// Remove the child `name`. A directory child must be empty unless
    /// `recursive`.
    async fn remove_entry(&self, name: &str, recursive: bool) -> FsResult<()>;

    /// Attributes of this directory.
    async fn metadata(&self) -> FsResult<HandleMeta>;
}

/// Capability for a file.
#[async_trait]
pub trait FileHandle: Send + Sync + Debug {
    /// Name of this file within its parent.
    fn name(&self) -> &str;

    /// Read the whole content.
    async fn read(&self) -> FsResult<Vec<u8>>;

    /// Replace the whole content.
    async fn write(&self, data: &[u8]) -> FsResult<()>;

    /// Attributes of this file.
    async fn metadata(&self) -> FsResult<HandleMeta>;
}
