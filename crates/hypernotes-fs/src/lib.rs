//! Hypernotes storage layer.
//!
//! A virtual filesystem addressed by named logical roots and relative
//! paths, backed by a granted directory capability and a metadata cache.

pub mod config;
pub mod vfs;

pub use config::FsConfig;
pub use vfs::{
    AccessProvider, CopyOptions, DirEntry, Encoding, EntryKind, Filesystem, FsError, FsResult,
    PermissionState, Session, Stat, WriteOptions,
};
