//! Local filesystem capability tree.
//!
//! Grants access to a real directory. Handles are rooted at that directory
//! and only ever join single validated names onto it. A symlinked child is
//! followed only when its target lies inside the grant.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use crate::vfs::capability::{DirectoryHandle, FileHandle, HandleEntry, HandleKind, HandleMeta};
use crate::vfs::error::{FsError, FsResult};
use crate::vfs::meta::system_millis;

/// Suffix of the scratch file used for replace-on-write.
const SCRATCH_SUFFIX: &str = ".hypernotes-partial";

/// A real directory granted as a storage root.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Grant access to `root`.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self { root }
    }

    /// Get the root path.
    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Root directory capability.
    pub fn root(&self) -> Arc<dyn DirectoryHandle> {
        Arc::new(LocalDir {
            name: String::new(),
            path: self.root.clone(),
            root: Arc::new(self.root.clone()),
        })
    }
}

/// Reject names that would address anything but a direct child.
fn check_name(name: &str) -> FsResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.ends_with(SCRATCH_SUFFIX)
    {
        return Err(FsError::permission_denied(format!("invalid entry name: {:?}", name)));
    }
    Ok(())
}

fn handle_meta(meta: &std::fs::Metadata) -> HandleMeta {
    let kind = if meta.is_dir() {
        HandleKind::Directory
    } else {
        HandleKind::File
    };
    HandleMeta {
        kind,
        size: if meta.is_dir() { 0 } else { meta.len() },
        modified: meta.modified().ok().map(system_millis),
    }
}

/// Stat a child, mapping "missing" to `None`.
async fn child_kind(path: &Path) -> FsResult<Option<HandleKind>> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(Some(HandleKind::Directory)),
        Ok(_) => Ok(Some(HandleKind::File)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FsError::from_io(e, path.display().to_string())),
    }
}

/// Directory capability on local disk.
#[derive(Debug)]
pub struct LocalDir {
    name: String,
    path: PathBuf,
    /// The granted root; every path handed out stays under it.
    root: Arc<PathBuf>,
}

impl LocalDir {
    /// Path of the child `name`, following a symlink only if its target
    /// stays inside the grant.
    ///
    /// Fails `PermissionDenied` for invalid names, dangling links and links
    /// that escape the root.
    async fn child(&self, name: &str) -> FsResult<PathBuf> {
        check_name(name)?;
        let path = self.path.join(name);
        match fs::symlink_metadata(&path).await {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::canonicalize(&path).await.map_err(|_| {
                    FsError::permission_denied(format!("{}: dangling symlink", name))
                })?;
                let target = dunce::simplified(&target).to_path_buf();
                if !target.starts_with(self.root.as_path()) {
                    return Err(FsError::permission_denied(format!(
                        "{} is not under {}",
                        target.display(),
                        self.root.display()
                    )));
                }
                Ok(target)
            }
            Ok(_) => Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(path),
            Err(e) => Err(FsError::from_io(e, name)),
        }
    }

    fn handle(&self, name: &str, path: PathBuf) -> LocalDir {
        LocalDir {
            name: name.to_string(),
            path,
            root: Arc::clone(&self.root),
        }
    }
}

/// File capability on local disk.
#[derive(Debug)]
pub struct LocalFile {
    name: String,
    path: PathBuf,
}

#[async_trait]
impl DirectoryHandle for LocalDir {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_directory(&self, name: &str, create: bool) -> FsResult<Arc<dyn DirectoryHandle>> {
        let path = self.child(name).await?;
        match child_kind(&path).await? {
            Some(HandleKind::Directory) => {}
            Some(HandleKind::File) => return Err(FsError::type_mismatch(name)),
            None if create => match fs::create_dir(&path).await {
                Ok(()) => {}
                // Lost a race with a concurrent creator; the kind check
                // below decides whether that is fine.
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if child_kind(&path).await? != Some(HandleKind::Directory) {
                        return Err(FsError::type_mismatch(name));
                    }
                }
                Err(e) => return Err(FsError::from_io(e, name)),
            },
            None => return Err(FsError::not_found(name)),
        }
        Ok(Arc::new(self.handle(name, path)))
    }

    async fn get_file(&self, name: &str, create: bool) -> FsResult<Arc<dyn FileHandle>> {
        let path = self.child(name).await?;
        match child_kind(&path).await? {
            Some(HandleKind::File) => {}
            Some(HandleKind::Directory) => return Err(FsError::type_mismatch(name)),
            None if create => {
                fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&path)
                    .await
                    .map_err(|e| FsError::from_io(e, name))?;
            }
            None => return Err(FsError::not_found(name)),
        }
        Ok(Arc::new(LocalFile {
            name: name.to_string(),
            path,
        }))
    }

    async fn kind_of(&self, name: &str) -> FsResult<Option<HandleKind>> {
        child_kind(&self.child(name).await?).await
    }

    async fn entries(&self) -> FsResult<Vec<HandleEntry>> {
        let mut dir = fs::read_dir(&self.path)
            .await
            .map_err(|e| FsError::from_io(e, self.path.display().to_string()))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(FsError::from)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(SCRATCH_SUFFIX) {
                continue;
            }
            // Links inside the grant list as what they point to; links
            // out of it are not part of the tree.
            let path = match self.child(&name).await {
                Ok(path) => path,
                Err(FsError::PermissionDenied(reason)) => {
                    tracing::debug!(%name, %reason, "skipping unreachable entry");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Some(kind) = child_kind(&path).await? else {
                continue;
            };
            entries.push(HandleEntry::new(name, kind));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> FsResult<()> {
        let target = self.child(name).await?;
        let path = self.path.join(name);
        if target != path {
            // Unlink, never the tree behind it.
            return fs::remove_file(&path)
                .await
                .map_err(|e| FsError::from_io(e, name));
        }
        let result = match child_kind(&path).await? {
            None => return Err(FsError::not_found(name)),
            Some(HandleKind::File) => fs::remove_file(&path).await,
            Some(HandleKind::Directory) if recursive => fs::remove_dir_all(&path).await,
            Some(HandleKind::Directory) => fs::remove_dir(&path).await,
        };
        result.map_err(|e| FsError::from_io(e, name))
    }

    async fn metadata(&self) -> FsResult<HandleMeta> {
        let meta = fs::metadata(&self.path)
            .await
            .map_err(|e| FsError::from_io(e, self.path.display().to_string()))?;
        Ok(handle_meta(&meta))
    }
}

#[async_trait]
impl FileHandle for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> FsResult<Vec<u8>> {
        fs::read(&self.path)
            .await
            .map_err(|e| FsError::from_io(e, self.name.clone()))
    }

    /// Replace content by writing a sibling scratch file and renaming it
    /// over the target, so readers never observe a half-written file.
    async fn write(&self, data: &[u8]) -> FsResult<()> {
        let scratch = self
            .path
            .with_file_name(format!(".{}{}", self.name, SCRATCH_SUFFIX));
        fs::write(&scratch, data)
            .await
            .map_err(|e| FsError::from_io(e, self.name.clone()))?;
        if let Err(e) = fs::rename(&scratch, &self.path).await {
            let _ = fs::remove_file(&scratch).await;
            return Err(FsError::from_io(e, self.name.clone()));
        }
        Ok(())
    }

    async fn metadata(&self) -> FsResult<HandleMeta> {
        let meta = fs::metadata(&self.path)
            .await
            .map_err(|e| FsError::from_io(e, self.name.clone()))?;
        Ok(handle_meta(&meta))
    }
}
