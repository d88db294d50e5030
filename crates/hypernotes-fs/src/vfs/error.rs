//! Filesystem error taxonomy.

use std::io;
use thiserror::Error;

/// Filesystem error type.
///
/// Every operation either succeeds or fails with exactly one of these.
/// Recursive operations surface the first child failure unchanged.
#[derive(Debug, Error)]
pub enum FsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation expected a file and got a directory, or vice versa.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Directory (or directory-addressed delete) is not empty.
    #[error("not empty: {0}")]
    NotEmpty(String),

    /// Content does not match the supplied or stored encoding.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Destination lies inside the source.
    #[error("destination {to} is inside source {from}")]
    PathConflict { from: String, to: String },

    /// Copy/move destination is an existing directory.
    #[error("cannot overwrite directory: {0}")]
    CannotOverwriteDirectory(String),

    /// Copy/move destination parent is missing or not a directory.
    #[error("parent is not a directory: {0}")]
    ParentNotDirectory(String),

    /// Directory copy/move onto an existing entry.
    #[error("directory collision: {0}")]
    DirectoryCollision(String),

    /// Host lacks capability-grant support.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The user declined the grant, or the root itself was targeted.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A file operation addressed a directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// A directory operation addressed a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// Metadata store failure.
    #[error("metadata store: {0}")]
    Metadata(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a TypeMismatch error.
    pub fn type_mismatch(path: impl Into<String>) -> Self {
        Self::TypeMismatch(path.into())
    }

    /// Create a NotEmpty error.
    pub fn not_empty(path: impl Into<String>) -> Self {
        Self::NotEmpty(path.into())
    }

    /// Create an InvalidEncoding error.
    pub fn invalid_encoding(msg: impl Into<String>) -> Self {
        Self::InvalidEncoding(msg.into())
    }

    /// Create a PathConflict error.
    pub fn path_conflict(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::PathConflict {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a CannotOverwriteDirectory error.
    pub fn cannot_overwrite_directory(path: impl Into<String>) -> Self {
        Self::CannotOverwriteDirectory(path.into())
    }

    /// Create a ParentNotDirectory error.
    pub fn parent_not_directory(path: impl Into<String>) -> Self {
        Self::ParentNotDirectory(path.into())
    }

    /// Create a DirectoryCollision error.
    pub fn directory_collision(path: impl Into<String>) -> Self {
        Self::DirectoryCollision(path.into())
    }

    /// Create an Unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Classify an I/O error raised while touching `path`.
    ///
    /// Kinds with a counterpart in the taxonomy are mapped onto it;
    /// anything else stays an `Io` error.
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path),
            io::ErrorKind::NotADirectory => Self::TypeMismatch(path),
            io::ErrorKind::IsADirectory => Self::TypeMismatch(path),
            io::ErrorKind::DirectoryNotEmpty => Self::NotEmpty(path),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io(err),
        }
    }

    /// Returns true for the "nothing at this path" family of errors.
    ///
    /// A `TypeMismatch` while walking means an ancestor segment is a file,
    /// so nothing can exist below it either.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::TypeMismatch(_))
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            FsError::TypeMismatch(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            FsError::NotEmpty(msg) => io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg),
            FsError::InvalidEncoding(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            e @ FsError::PathConflict { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
            FsError::CannotOverwriteDirectory(msg) => {
                io::Error::new(io::ErrorKind::IsADirectory, msg)
            }
            FsError::ParentNotDirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            FsError::DirectoryCollision(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            FsError::Unavailable(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            FsError::PermissionDenied(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            FsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            FsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            FsError::Config(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            FsError::Metadata(e) => io::Error::other(e),
            FsError::Io(e) => e,
        }
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;
