//! Core filesystem types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use super::encoding::Encoding;

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    #[strum(serialize = "directory", serialize = "dir")]
    Directory,
}

impl EntryKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata record for one file or directory, keyed by full path.
///
/// Content is not part of the record; it lives behind the file's
/// capability. `encoding` is set for files only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Full normalized path (leading `/`).
    pub path: String,
    /// Containing folder, derived from `path`.
    pub folder: String,
    pub kind: EntryKind,
    /// Stored byte length; 0 for directories.
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Milliseconds since the Unix epoch.
    pub modified_at: i64,
    pub encoding: Option<Encoding>,
}

impl Entry {
    /// Create a file record.
    pub fn file(path: impl Into<String>, size: u64, encoding: Encoding, now: i64) -> Self {
        let path = path.into();
        Self {
            folder: super::path::parent_folder(&path),
            path,
            kind: EntryKind::File,
            size,
            created_at: now,
            modified_at: now,
            encoding: Some(encoding),
        }
    }

    /// Create a directory record.
    pub fn directory(path: impl Into<String>, now: i64) -> Self {
        let path = path.into();
        Self {
            folder: super::path::parent_folder(&path),
            path,
            kind: EntryKind::Directory,
            size: 0,
            created_at: now,
            modified_at: now,
            encoding: None,
        }
    }
}

/// Result of `stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub kind: EntryKind,
    pub size: u64,
    pub created_at: i64,
    pub modified_at: i64,
    pub uri: String,
}

impl Stat {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// One row of a `readdir` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub created_at: i64,
    pub modified_at: i64,
    /// Full path; directory URIs end in `/`.
    pub uri: String,
}

/// Directory URIs carry a trailing separator so they can be told apart
/// from file URIs.
pub fn entry_uri(path: &str, kind: EntryKind) -> String {
    match kind {
        EntryKind::File => path.to_string(),
        EntryKind::Directory if path.ends_with('/') => path.to_string(),
        EntryKind::Directory => format!("{}/", path),
    }
}

/// State of the storage grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Prompt => "prompt",
        }
    }
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for `write_file_with`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Content encoding; `None` classifies the content with the base64
    /// round-trip heuristic.
    pub encoding: Option<Encoding>,
    /// Create missing ancestor directories.
    pub create_parents: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            create_parents: true,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content encoding.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Set whether missing ancestors are created.
    pub fn with_create_parents(mut self, create_parents: bool) -> Self {
        self.create_parents = create_parents;
        self
    }
}

/// Source and destination of a copy or move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOptions {
    /// Named logical root of the source.
    pub directory: String,
    pub from: String,
    pub to: String,
    /// Named logical root of the destination; defaults to `directory`.
    pub to_directory: Option<String>,
}

impl CopyOptions {
    pub fn new(directory: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            from: from.into(),
            to: to.into(),
            to_directory: None,
        }
    }

    /// Copy into a different named logical root.
    pub fn with_to_directory(mut self, to_directory: impl Into<String>) -> Self {
        self.to_directory = Some(to_directory.into());
        self
    }

    /// The destination's named logical root.
    pub fn destination_directory(&self) -> &str {
        self.to_directory.as_deref().unwrap_or(&self.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_strings() {
        assert_eq!(EntryKind::from_str("FILE"), Some(EntryKind::File));
        assert_eq!(EntryKind::from_str("dir"), Some(EntryKind::Directory));
        assert_eq!(EntryKind::from_str("symlink"), None);
        assert_eq!(EntryKind::Directory.to_string(), "directory");
    }

    #[test]
    fn test_entry_constructors() {
        let file = Entry::file("/DOCUMENTS/a.txt", 5, Encoding::Utf8, 42);
        assert_eq!(file.folder, "/DOCUMENTS");
        assert_eq!(file.created_at, 42);
        assert_eq!(file.encoding, Some(Encoding::Utf8));

        let dir = Entry::directory("/DOCUMENTS", 7);
        assert_eq!(dir.folder, "/");
        assert_eq!(dir.size, 0);
        assert!(dir.encoding.is_none());
    }

    #[test]
    fn test_entry_uri() {
        assert_eq!(entry_uri("/D/a.txt", EntryKind::File), "/D/a.txt");
        assert_eq!(entry_uri("/D/sub", EntryKind::Directory), "/D/sub/");
        assert_eq!(entry_uri("/", EntryKind::Directory), "/");
    }

    #[test]
    fn test_copy_options() {
        let opts = CopyOptions::new("DOCUMENTS", "a", "b");
        assert_eq!(opts.destination_directory(), "DOCUMENTS");
        let opts = opts.with_to_directory("ICLOUD");
        assert_eq!(opts.destination_directory(), "ICLOUD");
    }
}
