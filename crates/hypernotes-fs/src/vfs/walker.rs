//! Directory walker.
//!
//! Resolves a full path into a capability by walking one segment at a time
//! from the root handle. Every segment is its own suspend point; nothing
//! is held across segments and nothing is cached between calls.

use std::sync::Arc;

use super::capability::{DirectoryHandle, FileHandle, HandleKind};
use super::error::{FsError, FsResult};
use super::path;

/// A resolved terminal capability of either kind.
#[derive(Debug, Clone)]
pub enum Resolved {
    File(Arc<dyn FileHandle>),
    Directory(Arc<dyn DirectoryHandle>),
}

impl Resolved {
    pub fn kind(&self) -> HandleKind {
        match self {
            Resolved::File(_) => HandleKind::File,
            Resolved::Directory(_) => HandleKind::Directory,
        }
    }
}

/// Walk `segments` from `root`, acquiring (or creating) each directory.
///
/// When `create` is set, the full paths of segments that did not exist
/// before the walk are returned in creation order.
async fn walk(
    root: &Arc<dyn DirectoryHandle>,
    segments: &[&str],
    create: bool,
) -> FsResult<(Arc<dyn DirectoryHandle>, Vec<String>)> {
    let mut handle = Arc::clone(root);
    let mut walked = String::from("/");
    let mut created = Vec::new();
    for segment in segments {
        walked = path::join(&walked, segment);
        tracing::trace!(path = %walked, create, "resolving directory segment");
        if create && handle.kind_of(segment).await?.is_none() {
            created.push(walked.clone());
        }
        handle = handle
            .get_directory(segment, create)
            .await
            .map_err(|e| relabel(e, &walked))?;
    }
    Ok((handle, created))
}

/// Backends report errors against the child name; walkers report the
/// full path walked so far.
pub(crate) fn relabel(err: FsError, walked: &str) -> FsError {
    match err {
        FsError::NotFound(_) => FsError::not_found(walked),
        FsError::TypeMismatch(_) => FsError::type_mismatch(walked),
        other => other,
    }
}

/// Resolve the directory at `full_path`, creating missing segments if
/// `create`.
pub async fn resolve_directory(
    root: &Arc<dyn DirectoryHandle>,
    full_path: &str,
    create: bool,
) -> FsResult<Arc<dyn DirectoryHandle>> {
    let (handle, _) = walk(root, &path::segments(full_path), create).await?;
    Ok(handle)
}

/// Resolve the directory at `full_path`, creating it and any missing
/// ancestors. Returns the handle and the full paths that were created.
pub async fn create_directory(
    root: &Arc<dyn DirectoryHandle>,
    full_path: &str,
) -> FsResult<(Arc<dyn DirectoryHandle>, Vec<String>)> {
    walk(root, &path::segments(full_path), true).await
}

/// Resolve the parent directory of `full_path` and return it with the
/// terminal name.
///
/// Fails `PermissionDenied` for the root, which has no parent.
pub async fn resolve_parent(
    root: &Arc<dyn DirectoryHandle>,
    full_path: &str,
    create: bool,
) -> FsResult<(Arc<dyn DirectoryHandle>, String)> {
    let segments = path::segments(full_path);
    let Some((name, ancestors)) = segments.split_last() else {
        return Err(FsError::permission_denied("the storage root has no parent"));
    };
    let (parent, _) = walk(root, ancestors, create).await?;
    Ok((parent, (*name).to_string()))
}

/// Like [`resolve_parent`] with creation, also returning the full paths of
/// ancestors that had to be created.
pub async fn create_parent(
    root: &Arc<dyn DirectoryHandle>,
    full_path: &str,
) -> FsResult<(Arc<dyn DirectoryHandle>, String, Vec<String>)> {
    let segments = path::segments(full_path);
    let Some((name, ancestors)) = segments.split_last() else {
        return Err(FsError::permission_denied("the storage root has no parent"));
    };
    let (parent, created) = walk(root, ancestors, true).await?;
    Ok((parent, (*name).to_string(), created))
}

/// Resolve the file at `full_path`: all but the last segment as
/// directories, the last as a file.
pub async fn resolve_file(
    root: &Arc<dyn DirectoryHandle>,
    full_path: &str,
    create: bool,
) -> FsResult<Arc<dyn FileHandle>> {
    let (parent, name) = resolve_parent(root, full_path, create).await?;
    tracing::trace!(path = %full_path, create, "resolving file");
    parent
        .get_file(&name, create)
        .await
        .map_err(|e| relabel(e, full_path))
}

/// Resolve whatever lives at `full_path` without creating anything.
pub async fn resolve_entry(
    root: &Arc<dyn DirectoryHandle>,
    full_path: &str,
) -> FsResult<Resolved> {
    if path::is_root(full_path) {
        return Ok(Resolved::Directory(Arc::clone(root)));
    }
    let (parent, name) = resolve_parent(root, full_path, false).await?;
    match parent.kind_of(&name).await? {
        Some(HandleKind::File) => parent
            .get_file(&name, false)
            .await
            .map(Resolved::File)
            .map_err(|e| relabel(e, full_path)),
        Some(HandleKind::Directory) => parent
            .get_directory(&name, false)
            .await
            .map(Resolved::Directory)
            .map_err(|e| relabel(e, full_path)),
        None => Err(FsError::not_found(full_path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::MemoryBackend;

    fn root() -> Arc<dyn DirectoryHandle> {
        MemoryBackend::new().root()
    }

    #[tokio::test]
    async fn test_resolve_directory_create() {
        let root = root();
        resolve_directory(&root, "/a/b/c", true).await.unwrap();
        assert!(resolve_directory(&root, "/a/b", false).await.is_ok());
        assert!(resolve_directory(&root, "/a/b/c", false).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_directory_reports_new_segments() {
        let root = root();
        resolve_directory(&root, "/a", true).await.unwrap();

        let (_, created) = create_directory(&root, "/a/b/c").await.unwrap();
        assert_eq!(created, vec!["/a/b".to_string(), "/a/b/c".to_string()]);

        let (_, created) = create_directory(&root, "/a/b/c").await.unwrap();
        assert!(created.is_empty());

        let (_, name, created) = create_parent(&root, "/x/y/f.txt").await.unwrap();
        assert_eq!(name, "f.txt");
        assert_eq!(created, vec!["/x".to_string(), "/x/y".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_missing_reports_walked_path() {
        let root = root();
        resolve_directory(&root, "/a", true).await.unwrap();
        let err = resolve_directory(&root, "/a/missing/deeper", false)
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::NotFound(p) if p == "/a/missing"));
    }

    #[tokio::test]
    async fn test_resolve_file_through_file_is_type_mismatch() {
        let root = root();
        let file = resolve_file(&root, "/a/f.txt", true).await.unwrap();
        file.write(b"x").await.unwrap();

        let err = resolve_file(&root, "/a/f.txt/inner", false).await.unwrap_err();
        assert!(matches!(err, FsError::TypeMismatch(_)));
    }

    #[tokio::test]
    async fn test_resolve_entry_kinds() {
        let root = root();
        resolve_file(&root, "/d/f.txt", true).await.unwrap();

        assert_eq!(resolve_entry(&root, "/d").await.unwrap().kind(), HandleKind::Directory);
        assert_eq!(resolve_entry(&root, "/d/f.txt").await.unwrap().kind(), HandleKind::File);
        assert_eq!(resolve_entry(&root, "/").await.unwrap().kind(), HandleKind::Directory);
        assert!(resolve_entry(&root, "/d/nope").await.unwrap_err().is_absent());
    }

    #[tokio::test]
    async fn test_resolve_parent_of_root() {
        let root = root();
        let err = resolve_parent(&root, "/", false).await.unwrap_err();
        assert!(matches!(err, FsError::PermissionDenied(_)));
    }
}
