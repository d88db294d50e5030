//! Path-addressed virtual filesystem over a granted storage root.
//!
//! Key components:
//!
//! - [`Filesystem`] - Requests the storage grant and hands out sessions
//! - [`Session`] - File, directory and copy/move operations on one grant
//! - [`DirectoryHandle`] / [`FileHandle`] - Capabilities into the tree
//! - [`MetadataStore`] - SQLite cache of timestamps and encodings
//! - [`MemoryBackend`] / [`LocalBackend`] - Capability tree providers
//!
//! ## Design Decisions
//!
//! - **Tree is truth**: content, existence and kind come from the
//!   capability tree. The metadata store only adds what the tree cannot
//!   report and is repaired whenever it disagrees.
//! - **No ambient root**: every operation runs on a [`Session`] obtained
//!   from [`Filesystem::request_access`].
//! - **Stored encoding tags**: each file remembers the encoding it was
//!   written with, so reads and copies never re-guess it.
//! - **Best effort recursion**: `rmdir`, `copy` and `rename` stop at the
//!   first failure and do not roll back.

mod access;
pub mod backends;
pub mod capability;
mod copy;
mod dirs;
mod encoding;
mod error;
pub mod meta;
pub mod path;
mod session;
mod types;
pub mod walker;

pub use access::{AccessProvider, Filesystem};
pub use backends::{LocalBackend, MemoryBackend};
pub use capability::{DirectoryHandle, FileHandle, HandleEntry, HandleKind, HandleMeta};
pub use encoding::{Encoding, looks_like_base64};
pub use error::{FsError, FsResult};
pub use meta::MetadataStore;
pub use session::Session;
pub use types::{
    CopyOptions, DirEntry, Entry, EntryKind, PermissionState, Stat, WriteOptions, entry_uri,
};
