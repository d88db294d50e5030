//! Granted storage session and file operations.
//!
//! A [`Session`] owns the root capability handed out by a storage grant and
//! the metadata cache that shadows it. Every operation is a method on the
//! session; there is no ambient root.
//!
//! Operations address entries by a named logical root (`directory`) plus a
//! slash-separated tail (`path`), combined by [`path::full_path`].

use std::sync::Arc;

use super::capability::{DirectoryHandle, FileHandle};
use super::encoding::{Encoding, looks_like_base64};
use super::error::{FsError, FsResult};
use super::meta::MetadataStore;
use super::path;
use super::types::{Entry, EntryKind, Stat, WriteOptions, entry_uri};
use super::walker::{self, Resolved};

/// Explicit handle to a granted storage root.
///
/// Cloning shares the root and the metadata cache.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) root: Arc<dyn DirectoryHandle>,
    pub(crate) meta: Arc<MetadataStore>,
    pub(crate) label: String,
}

impl Session {
    /// Create a session over a granted root.
    ///
    /// `label` is the human-readable location of the root, used for
    /// logging and [`Session::root_uri`].
    pub fn new(
        root: Arc<dyn DirectoryHandle>,
        meta: Arc<MetadataStore>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            root,
            meta,
            label: label.into(),
        }
    }

    /// Human-readable location of the granted root.
    pub fn root_uri(&self) -> &str {
        &self.label
    }

    /// The metadata cache backing this session.
    pub fn metadata(&self) -> &MetadataStore {
        &self.meta
    }

    /// Drop every cached metadata record. The capability tree is untouched;
    /// files read afterwards fall back to handle timestamps and sniffed
    /// encodings until they are written again.
    pub fn clear_metadata(&self) -> FsResult<()> {
        tracing::info!(root = %self.label, "clearing metadata cache");
        self.meta.clear()
    }

    // ========================================================================
    // File operations
    // ========================================================================

    /// Read a file and render it in `encoding`, or in the encoding it was
    /// stored with when `None`.
    #[tracing::instrument(skip(self), name = "fs.read_file")]
    pub async fn read_file(
        &self,
        directory: &str,
        path: &str,
        encoding: Option<Encoding>,
    ) -> FsResult<String> {
        let full = path::full_path(directory, path);
        let (resolved, record) = self.lookup(&full).await?;
        let Resolved::File(file) = resolved else {
            return Err(FsError::type_mismatch(full));
        };
        let bytes = file.read().await?;
        tracing::debug!(path = %full, bytes = bytes.len(), "read content");
        let encoding = encoding
            .or(record.and_then(|r| r.encoding))
            .unwrap_or_else(|| Encoding::sniff(&bytes));
        encoding.encode(&bytes)
    }

    /// Create or overwrite a file, creating missing ancestors.
    ///
    /// Returns the file's URI.
    pub async fn write_file(
        &self,
        directory: &str,
        path: &str,
        content: &str,
        encoding: Option<Encoding>,
    ) -> FsResult<String> {
        let options = WriteOptions {
            encoding,
            ..WriteOptions::default()
        };
        self.write_file_with(directory, path, content, options).await
    }

    /// Create or overwrite a file.
    ///
    /// Content is stored as given; with no encoding it is UTF-8 text.
    /// Overwriting a file keeps its creation time; overwriting a directory
    /// fails `IsADirectory`.
    #[tracing::instrument(skip(self, content), name = "fs.write_file")]
    pub async fn write_file_with(
        &self,
        directory: &str,
        path: &str,
        content: &str,
        options: WriteOptions,
    ) -> FsResult<String> {
        let full = path::full_path(directory, path);
        if path::is_root(&full) {
            return Err(FsError::is_a_directory(full));
        }
        let encoding = options.encoding.unwrap_or(Encoding::Utf8);
        let bytes = encoding.decode(content)?;
        self.store_file(&full, &bytes, encoding, None, options.create_parents)
            .await?;
        Ok(full)
    }

    /// Append to a file, creating it (and its missing ancestors) if absent.
    ///
    /// With no encoding the content must be base64. Binary content merges
    /// with binary content and text with text; anything else fails
    /// `InvalidEncoding`. An empty file takes the incoming encoding.
    #[tracing::instrument(skip(self, content), name = "fs.append_file")]
    pub async fn append_file(
        &self,
        directory: &str,
        path: &str,
        content: &str,
        encoding: Option<Encoding>,
    ) -> FsResult<()> {
        let full = path::full_path(directory, path);
        if path::is_root(&full) {
            return Err(FsError::is_a_directory(full));
        }

        let existing = match self.lookup(&full).await {
            Ok((Resolved::Directory(_), _)) => return Err(FsError::is_a_directory(full)),
            Ok((Resolved::File(file), record)) => Some((file, record)),
            Err(FsError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        if encoding.is_none() && !looks_like_base64(content) {
            return Err(FsError::invalid_encoding(format!(
                "{}: content is not valid base64 and no encoding was given",
                full
            )));
        }
        let incoming = encoding.unwrap_or(Encoding::Base64);
        let appended = incoming.decode(content)?;

        let (bytes, stored_as, created_at) = match existing {
            Some((file, record)) => {
                let mut bytes = file.read().await?;
                let stored = if bytes.is_empty() {
                    incoming
                } else {
                    record
                        .as_ref()
                        .and_then(|r| r.encoding)
                        .unwrap_or_else(|| Encoding::sniff(&bytes))
                };
                if !stored.merges_with(incoming) {
                    return Err(FsError::invalid_encoding(format!(
                        "{}: cannot append {} content to {} content",
                        full, incoming, stored
                    )));
                }
                let created_at = match record {
                    Some(r) => Some(r.created_at),
                    None => file.metadata().await?.modified,
                };
                bytes.extend_from_slice(&appended);
                (bytes, stored.merged(incoming), created_at)
            }
            None => (appended, incoming, None),
        };

        let modified_at = self.meta.now();
        let times = created_at.map(|created| (created, modified_at));
        self.store_file(&full, &bytes, stored_as, times, true).await
    }

    /// Delete a file.
    ///
    /// Directories are never removed here: a non-empty one fails
    /// `NotEmpty`, an empty one `TypeMismatch`.
    #[tracing::instrument(skip(self), name = "fs.delete_file")]
    pub async fn delete_file(&self, directory: &str, path: &str) -> FsResult<()> {
        let full = path::full_path(directory, path);
        match self.lookup(&full).await? {
            (Resolved::File(_), _) => self.remove_file(&full).await,
            (Resolved::Directory(dir), _) => {
                if dir.entries().await?.is_empty() {
                    Err(FsError::type_mismatch(full))
                } else {
                    Err(FsError::not_empty(full))
                }
            }
        }
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    /// Resolve `full` in the capability tree and fetch its metadata record.
    ///
    /// The tree wins every disagreement: a record of the wrong kind is
    /// dropped, and records for paths that no longer resolve are purged
    /// before the miss is reported.
    pub(crate) async fn lookup(&self, full: &str) -> FsResult<(Resolved, Option<Entry>)> {
        let record = self.meta.get(full)?;
        match walker::resolve_entry(&self.root, full).await {
            Ok(resolved) => {
                let record = match record {
                    Some(r) if r.kind != resolved.kind() => {
                        tracing::warn!(path = %full, cached = %r.kind, actual = %resolved.kind(), "dropping mismatched metadata record");
                        self.meta.delete(full)?;
                        None
                    }
                    other => other,
                };
                Ok((resolved, record))
            }
            Err(e) if e.is_absent() => {
                if record.is_some() {
                    tracing::warn!(path = %full, "purging metadata for missing entry");
                    self.meta.delete_tree(full)?;
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Build a `Stat` from a resolved handle and its record, falling back to
    /// the handle's own modification time when there is no record.
    pub(crate) async fn describe(
        &self,
        full: &str,
        resolved: &Resolved,
        record: Option<&Entry>,
    ) -> FsResult<Stat> {
        let handle_meta = match resolved {
            Resolved::File(file) => file.metadata().await?,
            Resolved::Directory(dir) => dir.metadata().await?,
        };
        let fallback = handle_meta.modified.unwrap_or(0);
        let kind = resolved.kind();
        Ok(Stat {
            kind,
            size: handle_meta.size,
            created_at: record.map(|r| r.created_at).unwrap_or(fallback),
            modified_at: record.map(|r| r.modified_at).unwrap_or(fallback),
            uri: entry_uri(full, kind),
        })
    }

    /// Record directories the walker had to create.
    pub(crate) fn record_created(&self, created: &[String]) -> FsResult<()> {
        for dir in created {
            tracing::debug!(path = %dir, "created directory");
            self.meta.put(&Entry::directory(dir.clone(), self.meta.now()))?;
        }
        Ok(())
    }

    /// Replace the content of the file at `full` and upsert its record.
    ///
    /// `times` forces `(created_at, modified_at)`; otherwise an existing
    /// file keeps its creation time and both stamps are fresh for a new one.
    pub(crate) async fn store_file(
        &self,
        full: &str,
        bytes: &[u8],
        encoding: Encoding,
        times: Option<(i64, i64)>,
        create_parents: bool,
    ) -> FsResult<()> {
        let (parent, name) = if create_parents {
            let (parent, name, created) = walker::create_parent(&self.root, full).await?;
            self.record_created(&created)?;
            (parent, name)
        } else {
            walker::resolve_parent(&self.root, full, false).await?
        };

        let previous = parent.kind_of(&name).await?;
        if previous == Some(EntryKind::Directory) {
            return Err(FsError::is_a_directory(full));
        }
        let file: Arc<dyn FileHandle> = parent
            .get_file(&name, true)
            .await
            .map_err(|e| walker::relabel(e, full))?;

        let prior_created = match previous {
            Some(_) => match self.meta.get(full)? {
                Some(r) if r.kind.is_file() => Some(r.created_at),
                _ => file.metadata().await?.modified,
            },
            None => None,
        };

        file.write(bytes).await?;
        tracing::debug!(path = %full, bytes = bytes.len(), %encoding, "wrote content");

        let now = self.meta.now();
        let (created_at, modified_at) = times.unwrap_or((prior_created.unwrap_or(now), now));
        self.meta.put(&Entry {
            path: full.to_string(),
            folder: path::parent_folder(full),
            kind: EntryKind::File,
            size: bytes.len() as u64,
            created_at,
            modified_at,
            encoding: Some(encoding),
        })
    }

    /// Remove the file at `full` from the tree and the cache.
    pub(crate) async fn remove_file(&self, full: &str) -> FsResult<()> {
        let (parent, name) = walker::resolve_parent(&self.root, full, false).await?;
        parent
            .remove_entry(&name, false)
            .await
            .map_err(|e| walker::relabel(e, full))?;
        self.meta.delete(full)?;
        tracing::debug!(path = %full, "deleted file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::MemoryBackend;

    fn session() -> Session {
        let meta = Arc::new(MetadataStore::in_memory().unwrap());
        Session::new(MemoryBackend::new().root(), meta, "memory:")
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let s = session();
        let uri = s.write_file("D", "x.txt", "hello", None).await.unwrap();
        assert_eq!(uri, "/D/x.txt");
        assert_eq!(s.read_file("D", "x.txt", None).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_write_base64_stores_bytes() {
        let s = session();
        s.write_file("D", "bin", "aGVsbG8=", Some(Encoding::Base64))
            .await
            .unwrap();

        assert_eq!(s.read_file("D", "bin", None).await.unwrap(), "aGVsbG8=");
        assert_eq!(
            s.read_file("D", "bin", Some(Encoding::Utf8)).await.unwrap(),
            "hello"
        );
        let record = s.meta.get("/D/bin").unwrap().unwrap();
        assert_eq!(record.size, 5);
        assert_eq!(record.encoding, Some(Encoding::Base64));
    }

    #[tokio::test]
    async fn test_write_creates_ancestor_records() {
        let s = session();
        s.write_file("D", "a/b/c.txt", "x", Some(Encoding::Utf8))
            .await
            .unwrap();
        for dir in ["/D", "/D/a", "/D/a/b"] {
            let record = s.meta.get(dir).unwrap().unwrap();
            assert!(record.kind.is_dir(), "{dir} should be a directory record");
        }
    }

    #[tokio::test]
    async fn test_write_without_create_parents() {
        let s = session();
        let options = WriteOptions::new()
            .with_encoding(Encoding::Utf8)
            .with_create_parents(false);
        let err = s
            .write_file_with("D", "missing/x.txt", "x", options)
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_overwrite_keeps_created_at() {
        let s = session();
        s.write_file("D", "x.txt", "one", Some(Encoding::Utf8)).await.unwrap();
        let first = s.meta.get("/D/x.txt").unwrap().unwrap();
        s.write_file("D", "x.txt", "two!", Some(Encoding::Utf8)).await.unwrap();
        let second = s.meta.get("/D/x.txt").unwrap().unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.modified_at > first.modified_at);
        assert_eq!(second.size, 4);
    }

    #[tokio::test]
    async fn test_write_over_directory_rejected() {
        let s = session();
        s.write_file("D", "dir/f.txt", "x", Some(Encoding::Utf8)).await.unwrap();
        let err = s.write_file("D", "dir", "x", None).await.unwrap_err();
        assert!(matches!(err, FsError::IsADirectory(_)));
    }

    #[tokio::test]
    async fn test_read_directory_is_type_mismatch() {
        let s = session();
        s.write_file("D", "dir/f.txt", "x", Some(Encoding::Utf8)).await.unwrap();
        let err = s.read_file("D", "dir", None).await.unwrap_err();
        assert!(matches!(err, FsError::TypeMismatch(_)));
    }

    #[tokio::test]
    async fn test_append_binary_merges_decoded() {
        let s = session();
        s.append_file("D", "bin", "aGVs", None).await.unwrap();
        s.append_file("D", "bin", "bG8=", None).await.unwrap();
        assert_eq!(
            s.read_file("D", "bin", Some(Encoding::Utf8)).await.unwrap(),
            "hello"
        );
        assert_eq!(s.read_file("D", "bin", None).await.unwrap(), "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_append_mixed_encodings_rejected() {
        let s = session();
        s.write_file("D", "bin", "aGVsbG8=", Some(Encoding::Base64))
            .await
            .unwrap();
        let err = s
            .append_file("D", "bin", "text", Some(Encoding::Utf8))
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::InvalidEncoding(_)));

        s.write_file("D", "t.txt", "hello", Some(Encoding::Utf8)).await.unwrap();
        let err = s.append_file("D", "t.txt", "aGVsbG8=", None).await.unwrap_err();
        assert!(matches!(err, FsError::InvalidEncoding(_)));
    }

    #[tokio::test]
    async fn test_untagged_write_is_text() {
        let s = session();
        // Short words are valid base64 but still plain text.
        s.write_file("D", "note.txt", "test", None).await.unwrap();
        s.append_file("D", "note.txt", "!!!", Some(Encoding::Utf8))
            .await
            .unwrap();

        assert_eq!(s.read_file("D", "note.txt", None).await.unwrap(), "test!!!");
        let record = s.meta.get("/D/note.txt").unwrap().unwrap();
        assert_eq!(record.encoding, Some(Encoding::Utf8));
        assert_eq!(record.size, 7);
    }

    #[tokio::test]
    async fn test_empty_file_takes_appended_encoding() {
        let s = session();
        s.write_file("D", "empty.txt", "", None).await.unwrap();
        s.append_file("D", "empty.txt", "Note", Some(Encoding::Utf8))
            .await
            .unwrap();
        assert_eq!(s.read_file("D", "empty.txt", None).await.unwrap(), "Note");

        s.write_file("D", "empty.bin", "", None).await.unwrap();
        s.append_file("D", "empty.bin", "aGVsbG8=", None).await.unwrap();
        assert_eq!(s.read_file("D", "empty.bin", None).await.unwrap(), "aGVsbG8=");
        assert_eq!(
            s.meta.get("/D/empty.bin").unwrap().unwrap().encoding,
            Some(Encoding::Base64)
        );
    }

    #[tokio::test]
    async fn test_append_unspecified_non_base64_rejected() {
        let s = session();
        let err = s.append_file("D", "new/x", "plain words", None).await.unwrap_err();
        assert!(matches!(err, FsError::InvalidEncoding(_)));
        // Validation happens before any ancestor is created.
        assert!(s.lookup("/D").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_file() {
        let s = session();
        s.write_file("D", "x.txt", "hello", None).await.unwrap();
        s.delete_file("D", "x.txt").await.unwrap();
        assert!(matches!(
            s.read_file("D", "x.txt", None).await.unwrap_err(),
            FsError::NotFound(_)
        ));
        assert!(s.meta.get("/D/x.txt").unwrap().is_none());
        assert!(matches!(
            s.delete_file("D", "x.txt").await.unwrap_err(),
            FsError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_file_on_directory() {
        let s = session();
        s.write_file("D", "full/f.txt", "x", Some(Encoding::Utf8)).await.unwrap();
        s.mkdir("D", "empty", false).await.unwrap();

        assert!(matches!(
            s.delete_file("D", "full").await.unwrap_err(),
            FsError::NotEmpty(_)
        ));
        assert!(matches!(
            s.delete_file("D", "empty").await.unwrap_err(),
            FsError::TypeMismatch(_)
        ));
    }

    #[tokio::test]
    async fn test_untracked_file_falls_back_to_handle() {
        let s = session();
        let dir = s.root.get_directory("D", true).await.unwrap();
        let file = dir.get_file("external.txt", true).await.unwrap();
        file.write(b"made elsewhere").await.unwrap();

        assert_eq!(
            s.read_file("D", "external.txt", None).await.unwrap(),
            "made elsewhere"
        );
    }

    #[tokio::test]
    async fn test_stale_record_purged() {
        let s = session();
        s.write_file("D", "x.txt", "hello", None).await.unwrap();
        let dir = s.root.get_directory("D", false).await.unwrap();
        dir.remove_entry("x.txt", false).await.unwrap();

        assert!(s.read_file("D", "x.txt", None).await.is_err());
        assert!(s.meta.get("/D/x.txt").unwrap().is_none());
    }
}
