//! Directory operations on a [`Session`].

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;

use super::capability::{DirectoryHandle, HandleKind};
use super::error::{FsError, FsResult};
use super::path;
use super::session::Session;
use super::types::{DirEntry, Entry, Stat, entry_uri};
use super::walker::{self, Resolved};

impl Session {
    /// Create a directory and any missing ancestors.
    ///
    /// Ancestor creation is unconditional; `recursive` only records the
    /// caller's intent. Creating an existing directory succeeds.
    #[tracing::instrument(skip(self), name = "fs.mkdir")]
    pub async fn mkdir(&self, directory: &str, path: &str, recursive: bool) -> FsResult<()> {
        let full = path::full_path(directory, path);
        let (_, created) = walker::create_directory(&self.root, &full).await?;
        self.record_created(&created)
    }

    /// Remove a directory.
    ///
    /// Without `recursive` the directory must be empty. With it, children
    /// are removed depth first; the first failure aborts the call and
    /// whatever was already removed stays removed.
    #[tracing::instrument(skip(self), name = "fs.rmdir")]
    pub async fn rmdir(&self, directory: &str, path: &str, recursive: bool) -> FsResult<()> {
        let full = path::full_path(directory, path);
        if path::is_root(&full) {
            return Err(FsError::permission_denied("cannot remove the storage root"));
        }
        let dir = match self.lookup(&full).await? {
            (Resolved::Directory(dir), _) => dir,
            (Resolved::File(_), _) => return Err(FsError::not_a_directory(full)),
        };

        let children = dir.entries().await?;
        if !children.is_empty() {
            if !recursive {
                return Err(FsError::not_empty(full));
            }
            tracing::info!(path = %full, children = children.len(), "removing directory tree");
            self.remove_children(dir, full.clone()).await?;
        }

        let (parent, name) = walker::resolve_parent(&self.root, &full, false).await?;
        parent
            .remove_entry(&name, false)
            .await
            .map_err(|e| walker::relabel(e, &full))?;
        self.meta.delete_tree(&full)?;
        tracing::debug!(path = %full, "removed directory");
        Ok(())
    }

    /// Depth-first removal of everything below `dir`.
    fn remove_children(
        &self,
        dir: Arc<dyn DirectoryHandle>,
        full: String,
    ) -> BoxFuture<'_, FsResult<()>> {
        async move {
            for child in dir.entries().await? {
                let child_path = path::join(&full, &child.name);
                if child.kind == HandleKind::Directory {
                    let sub = dir
                        .get_directory(&child.name, false)
                        .await
                        .map_err(|e| walker::relabel(e, &child_path))?;
                    self.remove_children(sub, child_path.clone()).await?;
                }
                dir.remove_entry(&child.name, false)
                    .await
                    .map_err(|e| walker::relabel(e, &child_path))?;
                self.meta.delete(&child_path)?;
                tracing::debug!(path = %child_path, kind = %child.kind, "removed");
            }
            Ok(())
        }
        .boxed()
    }

    /// List the direct children of a directory.
    ///
    /// Kind and size come from the tree, timestamps from the metadata
    /// cache. Cached records with no counterpart in the tree are purged.
    #[tracing::instrument(skip(self), name = "fs.readdir")]
    pub async fn readdir(&self, directory: &str, path: &str) -> FsResult<Vec<DirEntry>> {
        let full = path::full_path(directory, path);
        let dir = match self.lookup(&full).await? {
            (Resolved::Directory(dir), _) => dir,
            (Resolved::File(_), _) => return Err(FsError::not_a_directory(full)),
        };

        let mut records: HashMap<String, Entry> = self
            .meta
            .list_children(&full)?
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();

        let mut listing = Vec::new();
        for child in dir.entries().await? {
            let child_path = path::join(&full, &child.name);
            let handle_meta = match child.kind {
                HandleKind::File => dir
                    .get_file(&child.name, false)
                    .await
                    .map_err(|e| walker::relabel(e, &child_path))?
                    .metadata()
                    .await?,
                HandleKind::Directory => dir
                    .get_directory(&child.name, false)
                    .await
                    .map_err(|e| walker::relabel(e, &child_path))?
                    .metadata()
                    .await?,
            };
            let fallback = handle_meta.modified.unwrap_or(0);
            let record = records.remove(&child_path).filter(|r| r.kind == child.kind);
            listing.push(DirEntry {
                uri: entry_uri(&child_path, child.kind),
                name: child.name,
                kind: child.kind,
                size: handle_meta.size,
                created_at: record.as_ref().map(|r| r.created_at).unwrap_or(fallback),
                modified_at: record.as_ref().map(|r| r.modified_at).unwrap_or(fallback),
            });
        }

        for stale in records.keys() {
            tracing::warn!(path = %stale, "purging metadata for missing entry");
            self.meta.delete_tree(stale)?;
        }
        Ok(listing)
    }

    /// Describe a file or directory.
    #[tracing::instrument(skip(self), name = "fs.stat")]
    pub async fn stat(&self, directory: &str, path: &str) -> FsResult<Stat> {
        let full = path::full_path(directory, path);
        let (resolved, record) = self.lookup(&full).await?;
        self.describe(&full, &resolved, record.as_ref()).await
    }

    /// Best-known URI for an entry.
    ///
    /// Prefers the cached record, then the tree, and falls back to the
    /// requested full path when neither knows the entry.
    #[tracing::instrument(skip(self), name = "fs.get_uri")]
    pub async fn get_uri(&self, directory: &str, path: &str) -> FsResult<String> {
        let full = path::full_path(directory, path);
        if let Some(record) = self.meta.get(&full)? {
            return Ok(entry_uri(&record.path, record.kind));
        }
        match walker::resolve_entry(&self.root, &full).await {
            Ok(resolved) => Ok(entry_uri(&full, resolved.kind())),
            Err(e) if e.is_absent() => Ok(full),
            Err(e) => Err(e),
        }
    }
}
