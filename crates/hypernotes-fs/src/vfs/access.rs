//! Storage grants.
//!
//! A host hands out access to one storage root through an
//! [`AccessProvider`]. [`Filesystem`] asks the provider for that root and
//! wraps the grant in a [`Session`]; nothing is stored ambiently, so a
//! caller without a session cannot reach the storage at all.

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use super::backends::{LocalBackend, MemoryBackend};
use super::capability::DirectoryHandle;
use super::error::{FsError, FsResult};
use super::meta::MetadataStore;
use super::session::Session;
use super::types::PermissionState;
use crate::config::FsConfig;

/// Source of the storage root capability.
#[async_trait]
pub trait AccessProvider: Send + Sync + Debug {
    /// Whether this host can grant storage at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Ask for the root capability. `Ok(None)` means the grant was declined.
    async fn request_root(&self) -> FsResult<Option<Arc<dyn DirectoryHandle>>>;

    /// Human-readable location of the root this provider grants.
    fn describe(&self) -> String;
}

#[async_trait]
impl AccessProvider for LocalBackend {
    async fn request_root(&self) -> FsResult<Option<Arc<dyn DirectoryHandle>>> {
        match tokio::fs::metadata(self.root_path()).await {
            Ok(meta) if meta.is_dir() => Ok(Some(self.root())),
            Ok(_) => {
                tracing::warn!(root = %self.root_path().display(), "storage root is not a directory");
                Ok(None)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(root = %self.root_path().display(), "storage root does not exist");
                Ok(None)
            }
            Err(e) => Err(FsError::from_io(e, self.root_path().display().to_string())),
        }
    }

    fn describe(&self) -> String {
        self.root_path().display().to_string()
    }
}

#[async_trait]
impl AccessProvider for MemoryBackend {
    async fn request_root(&self) -> FsResult<Option<Arc<dyn DirectoryHandle>>> {
        Ok(Some(self.root()))
    }

    fn describe(&self) -> String {
        "memory:".to_string()
    }
}

/// Entry point: turns a storage grant into a [`Session`].
#[derive(Debug, Clone)]
pub struct Filesystem {
    provider: Arc<dyn AccessProvider>,
    meta: Arc<MetadataStore>,
}

impl Filesystem {
    pub fn new(provider: Arc<dyn AccessProvider>, meta: Arc<MetadataStore>) -> Self {
        Self { provider, meta }
    }

    /// In-memory storage with an in-memory metadata cache.
    pub fn in_memory() -> FsResult<Self> {
        Ok(Self::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(MetadataStore::in_memory()?),
        ))
    }

    /// Build from configuration: a local directory grant when `root` is
    /// set, otherwise an in-memory tree.
    pub fn from_config(config: &FsConfig) -> FsResult<Self> {
        let provider: Arc<dyn AccessProvider> = match &config.root {
            Some(root) => Arc::new(LocalBackend::new(root.clone())),
            None => {
                tracing::info!("no storage root configured, using in-memory storage");
                Arc::new(MemoryBackend::new())
            }
        };
        let meta = match &config.metadata_path {
            Some(path) => {
                create_parent_dir(path)?;
                MetadataStore::open(path)?
            }
            None => MetadataStore::in_memory()?,
        };
        Ok(Self::new(provider, Arc::new(meta)))
    }

    /// Request the storage grant.
    ///
    /// Fails `Unavailable` when the host cannot grant storage and
    /// `PermissionDenied` when the grant is declined.
    pub async fn request_access(&self) -> FsResult<Session> {
        match self.request_permissions().await? {
            (_, Some(session)) => Ok(session),
            (_, None) => Err(FsError::permission_denied(format!(
                "access to {} was declined",
                self.provider.describe()
            ))),
        }
    }

    /// Request the storage grant, reporting a decline as
    /// [`PermissionState::Denied`] instead of an error.
    pub async fn request_permissions(&self) -> FsResult<(PermissionState, Option<Session>)> {
        if !self.provider.is_supported() {
            return Err(FsError::unavailable("host does not support storage grants"));
        }
        match self.provider.request_root().await? {
            Some(root) => {
                let label = self.provider.describe();
                tracing::info!(root = %label, "storage access granted");
                let session = Session::new(root, Arc::clone(&self.meta), label);
                Ok((PermissionState::Granted, Some(session)))
            }
            None => {
                tracing::info!(root = %self.provider.describe(), "storage access declined");
                Ok((PermissionState::Denied, None))
            }
        }
    }

    /// Request the storage grant and report where it points.
    pub async fn pick_directory(&self) -> FsResult<(Session, String)> {
        let session = self.request_access().await?;
        let uri = session.root_uri().to_string();
        Ok((session, uri))
    }

    /// Whether `session` holds a grant. Without one the caller still has to
    /// ask.
    pub fn check_access(&self, session: Option<&Session>) -> FsResult<PermissionState> {
        if !self.provider.is_supported() {
            return Err(FsError::unavailable("host does not support storage grants"));
        }
        Ok(match session {
            Some(_) => PermissionState::Granted,
            None => PermissionState::Prompt,
        })
    }
}

fn create_parent_dir(path: &Path) -> FsResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| FsError::from_io(e, parent.display().to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Declining;

    #[async_trait]
    impl AccessProvider for Declining {
        async fn request_root(&self) -> FsResult<Option<Arc<dyn DirectoryHandle>>> {
            Ok(None)
        }

        fn describe(&self) -> String {
            "declining".to_string()
        }
    }

    #[derive(Debug)]
    struct Unsupported;

    #[async_trait]
    impl AccessProvider for Unsupported {
        fn is_supported(&self) -> bool {
            false
        }

        async fn request_root(&self) -> FsResult<Option<Arc<dyn DirectoryHandle>>> {
            unreachable!("unsupported hosts are never asked")
        }

        fn describe(&self) -> String {
            "unsupported".to_string()
        }
    }

    fn with_provider(provider: impl AccessProvider + 'static) -> Filesystem {
        Filesystem::new(
            Arc::new(provider),
            Arc::new(MetadataStore::in_memory().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_grant_and_check() {
        let fs = Filesystem::in_memory().unwrap();
        assert_eq!(fs.check_access(None).unwrap(), PermissionState::Prompt);

        let session = fs.request_access().await.unwrap();
        assert_eq!(session.root_uri(), "memory:");
        assert_eq!(fs.check_access(Some(&session)).unwrap(), PermissionState::Granted);
    }

    #[tokio::test]
    async fn test_declined_grant() {
        let fs = with_provider(Declining);
        assert!(matches!(
            fs.request_access().await.unwrap_err(),
            FsError::PermissionDenied(_)
        ));
        let (state, session) = fs.request_permissions().await.unwrap();
        assert_eq!(state, PermissionState::Denied);
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_host() {
        let fs = with_provider(Unsupported);
        assert!(matches!(
            fs.request_access().await.unwrap_err(),
            FsError::Unavailable(_)
        ));
        assert!(matches!(
            fs.check_access(None).unwrap_err(),
            FsError::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_local_grant_requires_directory() {
        let dir = TempDir::new().unwrap();
        let fs = with_provider(LocalBackend::new(dir.path().join("missing")));
        assert!(matches!(
            fs.request_access().await.unwrap_err(),
            FsError::PermissionDenied(_)
        ));

        let fs = with_provider(LocalBackend::new(dir.path()));
        let (session, uri) = fs.pick_directory().await.unwrap();
        assert_eq!(uri, session.root_uri());
        session.write_file("D", "a.txt", "hi", None).await.unwrap();
        assert!(dir.path().join("D/a.txt").exists());
    }

    #[tokio::test]
    async fn test_from_config_persists_metadata() {
        let dir = TempDir::new().unwrap();
        let config = FsConfig {
            root: Some(dir.path().to_path_buf()),
            metadata_path: Some(dir.path().join("state/meta.db")),
            ..FsConfig::default()
        };

        let session = Filesystem::from_config(&config)
            .unwrap()
            .request_access()
            .await
            .unwrap();
        session.write_file("D", "a.txt", "hi", None).await.unwrap();
        let created = session.stat("D", "a.txt").await.unwrap().created_at;
        drop(session);

        let session = Filesystem::from_config(&config)
            .unwrap()
            .request_access()
            .await
            .unwrap();
        assert_eq!(session.stat("D", "a.txt").await.unwrap().created_at, created);
    }
}
