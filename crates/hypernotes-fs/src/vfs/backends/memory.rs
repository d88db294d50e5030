//! In-memory capability tree.
//!
//! Used for testing and for hosts without a persistent storage grant.
//! All data is lost when the last handle is dropped.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::SystemTime;

use crate::vfs::capability::{DirectoryHandle, FileHandle, HandleEntry, HandleKind, HandleMeta};
use crate::vfs::error::{FsError, FsResult};
use crate::vfs::meta::system_millis;

fn now() -> i64 {
    system_millis(SystemTime::now())
}

#[derive(Debug, Clone)]
enum Node {
    File(Arc<MemoryFile>),
    Directory(Arc<MemoryDir>),
}

impl Node {
    fn kind(&self) -> HandleKind {
        match self {
            Node::File(_) => HandleKind::File,
            Node::Directory(_) => HandleKind::Directory,
        }
    }
}

/// Directory node of the in-memory tree.
#[derive(Debug)]
pub struct MemoryDir {
    name: String,
    children: RwLock<BTreeMap<String, Node>>,
    modified: AtomicI64,
}

impl MemoryDir {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: RwLock::new(BTreeMap::new()),
            modified: AtomicI64::new(now()),
        }
    }

    fn touch(&self) {
        self.modified.store(now(), Ordering::Relaxed);
    }
}

/// File node of the in-memory tree.
#[derive(Debug)]
pub struct MemoryFile {
    name: String,
    data: RwLock<Vec<u8>>,
    modified: AtomicI64,
}

impl MemoryFile {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(Vec::new()),
            modified: AtomicI64::new(now()),
        }
    }
}

/// In-memory storage root.
///
/// Cloning shares the tree.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    root: Arc<MemoryDir>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self {
            root: Arc::new(MemoryDir::new("")),
        }
    }

    /// Root directory capability.
    pub fn root(&self) -> Arc<dyn DirectoryHandle> {
        self.root.clone()
    }
}

#[async_trait]
impl DirectoryHandle for MemoryDir {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_directory(&self, name: &str, create: bool) -> FsResult<Arc<dyn DirectoryHandle>> {
        if let Some(node) = self.children.read().get(name) {
            return match node {
                Node::Directory(dir) => Ok(dir.clone()),
                Node::File(_) => Err(FsError::type_mismatch(name)),
            };
        }
        if !create {
            return Err(FsError::not_found(name));
        }

        let mut children = self.children.write();
        // Another caller may have raced us between the two locks.
        let node = children
            .entry(name.to_string())
            .or_insert_with(|| Node::Directory(Arc::new(MemoryDir::new(name))))
            .clone();
        drop(children);
        self.touch();
        match node {
            Node::Directory(dir) => Ok(dir),
            Node::File(_) => Err(FsError::type_mismatch(name)),
        }
    }

    async fn get_file(&self, name: &str, create: bool) -> FsResult<Arc<dyn FileHandle>> {
        if let Some(node) = self.children.read().get(name) {
            return match node {
                Node::File(file) => Ok(file.clone()),
                Node::Directory(_) => Err(FsError::type_mismatch(name)),
            };
        }
        if !create {
            return Err(FsError::not_found(name));
        }

        let mut children = self.children.write();
        let node = children
            .entry(name.to_string())
            .or_insert_with(|| Node::File(Arc::new(MemoryFile::new(name))))
            .clone();
        drop(children);
        self.touch();
        match node {
            Node::File(file) => Ok(file),
            Node::Directory(_) => Err(FsError::type_mismatch(name)),
        }
    }

    async fn kind_of(&self, name: &str) -> FsResult<Option<HandleKind>> {
        Ok(self.children.read().get(name).map(Node::kind))
    }

    async fn entries(&self) -> FsResult<Vec<HandleEntry>> {
        Ok(self
            .children
            .read()
            .iter()
            .map(|(name, node)| HandleEntry::new(name.clone(), node.kind()))
            .collect())
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> FsResult<()> {
        let mut children = self.children.write();
        match children.get(name) {
            None => return Err(FsError::not_found(name)),
            Some(Node::Directory(dir)) if !recursive && !dir.children.read().is_empty() => {
                return Err(FsError::not_empty(name));
            }
            Some(_) => {}
        }
        children.remove(name);
        drop(children);
        self.touch();
        Ok(())
    }

    async fn metadata(&self) -> FsResult<HandleMeta> {
        Ok(HandleMeta {
            kind: HandleKind::Directory,
            size: 0,
            modified: Some(self.modified.load(Ordering::Relaxed)),
        })
    }
}

#[async_trait]
impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> FsResult<Vec<u8>> {
        Ok(self.data.read().clone())
    }

    async fn write(&self, data: &[u8]) -> FsResult<()> {
        *self.data.write() = data.to_vec();
        self.modified.store(now(), Ordering::Relaxed);
        Ok(())
    }

    async fn metadata(&self) -> FsResult<HandleMeta> {
        Ok(HandleMeta {
            kind: HandleKind::File,
            size: self.data.read().len() as u64,
            modified: Some(self.modified.load(Ordering::Relaxed)),
        })
    }
}
