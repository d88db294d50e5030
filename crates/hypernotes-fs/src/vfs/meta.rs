//! SQLite metadata cache.
//!
//! One row per entry keyed by full path, with a secondary index on the
//! containing folder for one-level listings. The capability tree remains
//! the source of truth for existence, kind and content; this store keeps
//! what the tree cannot: creation times, our own modification stamps and
//! the encoding tag of each file.
//!
//! Each call is one SQLite statement and therefore atomic on its own.
//! Nothing spans calls: a multi-step operation can stop half way.

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::encoding::Encoding;
use super::error::FsResult;
use super::types::{Entry, EntryKind};

/// Bump when the `entries` layout changes; older stores are rebuilt.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    path TEXT PRIMARY KEY,
    folder TEXT NOT NULL,
    kind TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    modified_at INTEGER NOT NULL,
    encoding TEXT
);
CREATE INDEX IF NOT EXISTS idx_entries_folder ON entries(folder);
"#;

/// Milliseconds since the Unix epoch.
pub fn system_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Wall clock that never repeats or goes backwards.
#[derive(Debug, Default)]
pub struct Clock {
    last: AtomicI64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in milliseconds, strictly greater than any value this
    /// clock returned before.
    pub fn now(&self) -> i64 {
        let wall = system_millis(SystemTime::now());
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let next = wall.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

/// Metadata store handle.
pub struct MetadataStore {
    conn: Mutex<Connection>,
    clock: Clock,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore").finish_non_exhaustive()
    }
}

impl MetadataStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> FsResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> FsResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> FsResult<Self> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version != SCHEMA_VERSION {
            if version != 0 {
                tracing::info!(from = version, to = SCHEMA_VERSION, "rebuilding metadata store");
            }
            conn.execute_batch("DROP TABLE IF EXISTS entries;")?;
            conn.execute_batch(SCHEMA)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        } else {
            conn.execute_batch(SCHEMA)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Clock::new(),
        })
    }

    /// Timestamp for a new or modified entry.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Get the record at `path`.
    pub fn get(&self, path: &str) -> FsResult<Option<Entry>> {
        let conn = self.conn.lock();
        let entry = conn
            .query_row(
                "SELECT path, folder, kind, size, created_at, modified_at, encoding
                 FROM entries WHERE path = ?1",
                params![path],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Insert or replace the record at `entry.path`.
    pub fn put(&self, entry: &Entry) -> FsResult<()> {
        tracing::trace!(path = %entry.path, kind = %entry.kind, size = entry.size, "metadata upsert");
        self.conn.lock().execute(
            "INSERT INTO entries (path, folder, kind, size, created_at, modified_at, encoding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(path) DO UPDATE SET
                folder = excluded.folder,
                kind = excluded.kind,
                size = excluded.size,
                created_at = excluded.created_at,
                modified_at = excluded.modified_at,
                encoding = excluded.encoding",
            params![
                entry.path,
                entry.folder,
                entry.kind.as_str(),
                entry.size as i64,
                entry.created_at,
                entry.modified_at,
                entry.encoding.map(|e| e.as_str()),
            ],
        )?;
        Ok(())
    }

    /// Delete the record at `path`. Returns true if one existed.
    pub fn delete(&self, path: &str) -> FsResult<bool> {
        tracing::trace!(path = %path, "metadata delete");
        let n = self
            .conn
            .lock()
            .execute("DELETE FROM entries WHERE path = ?1", params![path])?;
        Ok(n > 0)
    }

    /// Delete the record at `path` and every record below it.
    pub fn delete_tree(&self, path: &str) -> FsResult<usize> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let n = self.conn.lock().execute(
            "DELETE FROM entries
             WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
            params![path, prefix],
        )?;
        Ok(n)
    }

    /// Records whose folder is exactly `folder` (one level, not recursive).
    pub fn list_children(&self, folder: &str) -> FsResult<Vec<Entry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT path, folder, kind, size, created_at, modified_at, encoding
             FROM entries WHERE folder = ?1 ORDER BY path",
        )?;
        let rows = stmt.query_map(params![folder], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Drop every record.
    pub fn clear(&self) -> FsResult<()> {
        self.conn.lock().execute("DELETE FROM entries", [])?;
        Ok(())
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let kind: String = row.get(2)?;
    let size: i64 = row.get(3)?;
    let encoding: Option<String> = row.get(6)?;
    Ok(Entry {
        path: row.get(0)?,
        folder: row.get(1)?,
        kind: EntryKind::from_str(&kind).unwrap_or(EntryKind::File),
        size: size.max(0) as u64,
        created_at: row.get(4)?,
        modified_at: row.get(5)?,
        encoding: encoding.as_deref().and_then(Encoding::from_str),
    })
}
