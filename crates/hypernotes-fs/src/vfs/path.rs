//! Path resolution.
//!
//! Paths are slash-separated strings. Normalized paths have no empty, `.`
//! or `..` segments; full paths additionally carry a leading `/` and start
//! with the named logical root (`/DOCUMENTS/notes/a.html`). The root of the
//! granted storage is `/`.

/// Normalize a relative path expression.
///
/// Empty and `.` segments are dropped. A `..` pops the last retained
/// segment; with nothing left to pop it is discarded, so a path can never
/// climb above the root.
pub fn normalize(path: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if kept.last().is_some_and(|last| *last != "..") {
                    kept.pop();
                }
            }
            s => kept.push(s),
        }
    }
    kept.join("/")
}

/// Segments of a normalized path.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// True iff `child`'s segment sequence strictly extends `parent`'s.
pub fn is_ancestor(parent: &str, child: &str) -> bool {
    let parent = normalize(parent);
    let child = normalize(child);
    if parent == child {
        return false;
    }
    let parent_segments = segments(&parent);
    let child_segments = segments(&child);
    parent_segments.len() < child_segments.len()
        && parent_segments
            .iter()
            .zip(child_segments.iter())
            .all(|(a, b)| a == b)
}

/// Build the full path for `path` under the named logical root `directory`.
///
/// The result is `/` + directory + `/` + path, normalized. `path` is
/// normalized on its own first, so a leading `..` stops at `directory`
/// and never reaches a sibling root.
pub fn full_path(directory: &str, path: &str) -> String {
    let root = normalize(directory);
    let tail = normalize(path);
    match (root.is_empty(), tail.is_empty()) {
        (_, true) => format!("/{}", root),
        (true, false) => format!("/{}", tail),
        (false, false) => format!("/{}/{}", root, tail),
    }
}

/// Join a child name onto a full path.
pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// The containing folder of a full path (`/` for top-level entries).
pub fn parent_folder(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}

/// The final segment of a path, or `None` for the root.
pub fn file_name(path: &str) -> Option<&str> {
    segments(path).last().copied()
}

/// Returns true if the full path addresses the granted root.
pub fn is_root(path: &str) -> bool {
    segments(path).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a/./b/../c"), "a/c");
        assert_eq!(normalize("../a"), "a");
        assert_eq!(normalize("/a//b/"), "a/b");
        assert_eq!(normalize("a/../.."), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_is_ancestor() {
        assert!(is_ancestor("a/b", "a/b/c"));
        assert!(!is_ancestor("a/b", "a/bc"));
        assert!(!is_ancestor("a/b", "a/b"));
        assert!(!is_ancestor("a/b/c", "a/b"));
        assert!(is_ancestor("/docs", "/docs/sub/x"));
        assert!(is_ancestor("a/./b", "a/b/c"));
    }

    #[test]
    fn test_full_path() {
        assert_eq!(full_path("DOCUMENTS", "notes/a.txt"), "/DOCUMENTS/notes/a.txt");
        assert_eq!(full_path("DOCUMENTS", "/notes/"), "/DOCUMENTS/notes");
        assert_eq!(full_path("DOCUMENTS", ""), "/DOCUMENTS");
        assert_eq!(full_path("", ""), "/");
        assert_eq!(full_path("DOCUMENTS", "a/../b"), "/DOCUMENTS/b");
        assert_eq!(full_path("DOCUMENTS", "./a.txt"), "/DOCUMENTS/a.txt");
    }

    #[test]
    fn test_full_path_stays_under_directory() {
        assert_eq!(full_path("DOCUMENTS", "../../etc"), "/DOCUMENTS/etc");
        assert_eq!(full_path("DOCUMENTS", "../ARCHIVE/x"), "/DOCUMENTS/ARCHIVE/x");
        assert_eq!(full_path("DOCUMENTS", ".."), "/DOCUMENTS");
        assert_eq!(full_path("", "../x"), "/x");
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent_folder("/DOCUMENTS/notes/a.txt"), "/DOCUMENTS/notes");
        assert_eq!(parent_folder("/DOCUMENTS"), "/");
        assert_eq!(file_name("/DOCUMENTS/notes/a.txt"), Some("a.txt"));
        assert_eq!(file_name("/"), None);
        assert_eq!(join("/", "DOCUMENTS"), "/DOCUMENTS");
        assert_eq!(join("/DOCUMENTS", "a"), "/DOCUMENTS/a");
        assert!(is_root("/"));
    }
}
