//! Utility functions
//!
//! Directory creation, archive member path handling and formatting helpers.

use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Reduce an archive member name to a safe relative path.
///
/// Backslashes are treated as separators; root, prefix, `.` and `..`
/// components are dropped so the result never escapes its parent.
pub fn sanitize_member_path(name: &str) -> PathBuf {
    let normalized = name.replace('\\', "/");
    Path::new(&normalized)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Create `root/segments...`, returning the final directory.
///
/// Returns `None` when `root` does not exist or a directory cannot be
/// created.
pub fn ensure_dirs<P: AsRef<Path>>(root: &Path, segments: &[P]) -> Option<PathBuf> {
    if !root.is_dir() {
        warn!("Root directory does not exist: {}", root.display());
        return None;
    }

    let mut path = root.to_path_buf();
    for segment in segments {
        path.push(segment);
    }

    match std::fs::create_dir_all(&path) {
        Ok(()) => Some(path),
        Err(e) => {
            warn!("Failed to create {}: {}", path.display(), e);
            None
        }
    }
}

/// Format elapsed seconds as `1h 02m 03.4s`, `2m 03.4s` or `3.40s`
pub fn format_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let whole = seconds as u64;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let rest = seconds - (hours * 3600 + minutes * 60) as f64;

    if hours > 0 {
        format!("{}h {:02}m {:04.1}s", hours, minutes, rest)
    } else if minutes > 0 {
        format!("{}m {:04.1}s", minutes, rest)
    } else {
        format!("{:.2}s", rest)
    }
}

/// Singular or plural noun for a count
pub fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_member_path() {
        assert_eq!(sanitize_member_path("01.jpg"), PathBuf::from("01.jpg"));
        assert_eq!(
            sanitize_member_path("/abs/../x/./02.jpg"),
            PathBuf::from("abs/x/02.jpg")
        );
        assert_eq!(
            sanitize_member_path("dir\\sub\\03.png"),
            PathBuf::from("dir/sub/03.png")
        );
        assert_eq!(sanitize_member_path(".."), PathBuf::new());
    }

    #[test]
    fn test_ensure_dirs_creates_segments() {
        let dir = tempdir().unwrap();
        let path = ensure_dirs(dir.path(), &["a", "b/c"]).unwrap();
        assert!(path.is_dir());
        assert_eq!(path, dir.path().join("a").join("b/c"));
    }

    #[test]
    fn test_ensure_dirs_missing_root() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(ensure_dirs(&missing, &["a"]).is_none());
        assert!(!missing.exists());
    }

    #[test]
    fn test_ensure_dirs_no_segments() {
        let dir = tempdir().unwrap();
        let empty: [&str; 0] = [];
        assert_eq!(ensure_dirs(dir.path(), &empty), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(3.4), "3.40s");
        assert_eq!(format_elapsed(123.4), "2m 03.4s");
        assert_eq!(format_elapsed(3723.4), "1h 02m 03.4s");
        assert_eq!(format_elapsed(-1.0), "0.00s");
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "page", "pages"), "1 page");
        assert_eq!(plural(3, "page", "pages"), "3 pages");
    }
}
