//! Recursive copy and move.
//!
//! Both walk the source tree and replay it at the destination, one entry at
//! a time. Neither is atomic: a failure part way through leaves a partially
//! populated destination and, for a move, a partially emptied source.

use futures::future::{BoxFuture, FutureExt};

use super::encoding::Encoding;
use super::error::{FsError, FsResult};
use super::path;
use super::session::Session;
use super::types::{CopyOptions, Entry, EntryKind, entry_uri};
use super::walker::{self, Resolved};

impl Session {
    /// Copy a file or directory tree. Returns the destination URI.
    #[tracing::instrument(skip(self), name = "fs.copy")]
    pub async fn copy(&self, options: &CopyOptions) -> FsResult<String> {
        let (from, to) = endpoints(options);
        let kind = self.copy_or_move(from, to.clone(), false).await?;
        Ok(entry_uri(&to, kind))
    }

    /// Move a file or directory tree, carrying its timestamps.
    #[tracing::instrument(skip(self), name = "fs.rename")]
    pub async fn rename(&self, options: &CopyOptions) -> FsResult<()> {
        let (from, to) = endpoints(options);
        self.copy_or_move(from, to, true).await?;
        Ok(())
    }

    /// Returns the kind of the source entry.
    fn copy_or_move(
        &self,
        from: String,
        to: String,
        moving: bool,
    ) -> BoxFuture<'_, FsResult<EntryKind>> {
        async move {
            if from == to {
                let (resolved, _) = self.lookup(&from).await?;
                return Ok(resolved.kind());
            }
            if path::is_ancestor(&from, &to) {
                return Err(FsError::path_conflict(from, to));
            }

            let destination_exists = match self.lookup(&to).await {
                Ok((Resolved::Directory(_), _)) => {
                    return Err(FsError::cannot_overwrite_directory(to));
                }
                Ok((Resolved::File(_), _)) => true,
                Err(e) if e.is_absent() => {
                    let parent = path::parent_folder(&to);
                    match walker::resolve_entry(&self.root, &parent).await {
                        Ok(Resolved::Directory(_)) => false,
                        Ok(Resolved::File(_)) => return Err(FsError::parent_not_directory(to)),
                        Err(e) if e.is_absent() => {
                            return Err(FsError::parent_not_directory(to));
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            };

            let (source, record) = self.lookup(&from).await?;
            let times = match &record {
                Some(r) if moving => Some((r.created_at, r.modified_at)),
                _ => None,
            };

            match source {
                Resolved::File(file) => {
                    let bytes = file.read().await?;
                    let encoding = record
                        .and_then(|r| r.encoding)
                        .unwrap_or_else(|| Encoding::sniff(&bytes));
                    self.store_file(&to, &bytes, encoding, times, false).await?;
                    if moving {
                        self.remove_file(&from).await?;
                    }
                    tracing::debug!(%from, %to, moving, "transferred file");
                    Ok(EntryKind::File)
                }
                Resolved::Directory(dir) => {
                    if destination_exists {
                        return Err(FsError::directory_collision(to));
                    }
                    let (parent, name) = walker::resolve_parent(&self.root, &to, false).await?;
                    parent
                        .get_directory(&name, true)
                        .await
                        .map_err(|e| walker::relabel(e, &to))?;

                    let mut entry = Entry::directory(to.clone(), self.meta.now());
                    if let Some((created_at, modified_at)) = times {
                        entry.created_at = created_at;
                        entry.modified_at = modified_at;
                    }
                    self.meta.put(&entry)?;

                    let children = dir.entries().await?;
                    tracing::debug!(%from, %to, moving, children = children.len(), "transferring directory");
                    for child in children {
                        self.copy_or_move(
                            path::join(&from, &child.name),
                            path::join(&to, &child.name),
                            moving,
                        )
                        .await?;
                    }

                    if moving {
                        let (parent, name) =
                            walker::resolve_parent(&self.root, &from, false).await?;
                        parent
                            .remove_entry(&name, false)
                            .await
                            .map_err(|e| walker::relabel(e, &from))?;
                        self.meta.delete_tree(&from)?;
                    }
                    Ok(EntryKind::Directory)
                }
            }
        }
        .boxed()
    }
}

fn endpoints(options: &CopyOptions) -> (String, String) {
    (
        path::full_path(&options.directory, &options.from),
        path::full_path(options.destination_directory(), &options.to),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::MemoryBackend;
    use crate::vfs::meta::MetadataStore;
    use std::sync::Arc;

    fn session() -> Session {
        let meta = Arc::new(MetadataStore::in_memory().unwrap());
        Session::new(MemoryBackend::new().root(), meta, "memory:")
    }

    #[tokio::test]
    async fn test_copy_file() {
        let s = session();
        s.write_file("D", "a.txt", "hello", Some(Encoding::Utf8)).await.unwrap();

        let uri = s.copy(&CopyOptions::new("D", "a.txt", "b.txt")).await.unwrap();
        assert_eq!(uri, "/D/b.txt");
        assert_eq!(s.read_file("D", "a.txt", None).await.unwrap(), "hello");
        assert_eq!(s.read_file("D", "b.txt", None).await.unwrap(), "hello");

        let source = s.meta.get("/D/a.txt").unwrap().unwrap();
        let copy = s.meta.get("/D/b.txt").unwrap().unwrap();
        assert!(copy.created_at > source.created_at);
    }

    #[tokio::test]
    async fn test_copy_keeps_stored_encoding() {
        let s = session();
        // Text that happens to be valid base64 keeps its text tag.
        s.write_file("D", "word.txt", "abcd", Some(Encoding::Utf8)).await.unwrap();
        s.copy(&CopyOptions::new("D", "word.txt", "copy.txt")).await.unwrap();
        assert_eq!(s.read_file("D", "copy.txt", None).await.unwrap(), "abcd");
    }

    #[tokio::test]
    async fn test_copy_into_self_conflicts() {
        let s = session();
        s.mkdir("D", "docs", false).await.unwrap();
        let err = s
            .copy(&CopyOptions::new("D", "docs", "docs/sub"))
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::PathConflict { .. }));
    }

    #[tokio::test]
    async fn test_copy_same_path_is_noop() {
        let s = session();
        s.write_file("D", "a.txt", "x", Some(Encoding::Utf8)).await.unwrap();
        let uri = s.copy(&CopyOptions::new("D", "a.txt", "./a.txt")).await.unwrap();
        assert_eq!(uri, "/D/a.txt");
    }

    #[tokio::test]
    async fn test_copy_tree_across_roots() {
        let s = session();
        s.write_file("D", "docs/a.txt", "a", Some(Encoding::Utf8)).await.unwrap();
        s.write_file("D", "docs/sub/b.bin", "aGVsbG8=", Some(Encoding::Base64))
            .await
            .unwrap();
        s.mkdir("OTHER", "", false).await.unwrap();

        let uri = s
            .copy(&CopyOptions::new("D", "docs", "backup").with_to_directory("OTHER"))
            .await
            .unwrap();
        assert_eq!(uri, "/OTHER/backup/");
        assert_eq!(s.read_file("OTHER", "backup/a.txt", None).await.unwrap(), "a");
        assert_eq!(
            s.read_file("OTHER", "backup/sub/b.bin", None).await.unwrap(),
            "aGVsbG8="
        );
        assert!(s.stat("D", "docs/sub/b.bin").await.is_ok());
    }

    #[tokio::test]
    async fn test_destination_rules() {
        let s = session();
        s.write_file("D", "a", "x", Some(Encoding::Utf8)).await.unwrap();
        s.mkdir("D", "b", false).await.unwrap();

        assert!(matches!(
            s.rename(&CopyOptions::new("D", "a", "b")).await.unwrap_err(),
            FsError::CannotOverwriteDirectory(_)
        ));
        assert!(matches!(
            s.rename(&CopyOptions::new("D", "a", "missing/a")).await.unwrap_err(),
            FsError::ParentNotDirectory(_)
        ));
        assert!(matches!(
            s.rename(&CopyOptions::new("D", "b", "a")).await.unwrap_err(),
            FsError::DirectoryCollision(_)
        ));
        assert!(matches!(
            s.rename(&CopyOptions::new("D", "nope", "c")).await.unwrap_err(),
            FsError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_move_file_overwrites_and_carries_times() {
        let s = session();
        s.write_file("D", "a", "new", Some(Encoding::Utf8)).await.unwrap();
        s.write_file("D", "b", "old", Some(Encoding::Utf8)).await.unwrap();
        let source = s.meta.get("/D/a").unwrap().unwrap();

        s.rename(&CopyOptions::new("D", "a", "b")).await.unwrap();

        assert_eq!(s.read_file("D", "b", None).await.unwrap(), "new");
        assert!(matches!(
            s.stat("D", "a").await.unwrap_err(),
            FsError::NotFound(_)
        ));
        let moved = s.meta.get("/D/b").unwrap().unwrap();
        assert_eq!(moved.created_at, source.created_at);
        assert_eq!(moved.modified_at, source.modified_at);
    }

    #[tokio::test]
    async fn test_move_tree() {
        let s = session();
        s.write_file("D", "src/a.txt", "a", Some(Encoding::Utf8)).await.unwrap();
        s.write_file("D", "src/sub/b.txt", "b", Some(Encoding::Utf8)).await.unwrap();
        let created = s.meta.get("/D/src").unwrap().unwrap().created_at;

        s.rename(&CopyOptions::new("D", "src", "dst")).await.unwrap();

        assert!(s.stat("D", "src").await.is_err());
        assert!(s.meta.get("/D/src/sub/b.txt").unwrap().is_none());
        assert_eq!(s.read_file("D", "dst/sub/b.txt", None).await.unwrap(), "b");
        assert_eq!(s.meta.get("/D/dst").unwrap().unwrap().created_at, created);
    }
}
