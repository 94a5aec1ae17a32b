//! Filesystem image discovery
//!
//! Walks a project's image root and yields every image file below it as a
//! project-relative key (see [`super::paths`]). The walk is lazy and keeps
//! only the directory stack in memory, so it is safe on very large trees.
//!
//! Symbolic links are followed. `walkdir` tracks the ancestors of every
//! directory it descends into and reports a link back to one of them as an
//! error instead of recursing, so cyclic links terminate. A depth cap bounds
//! the walk independently of that.

use aide_common::media::ExtensionSet;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

use super::paths::relative_key;

/// Directory levels below the root that are walked by default.
pub const DEFAULT_MAX_SCAN_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Image folder '{}' does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("Image folder '{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to read image folder '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("Scan task failed: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct Scanner {
    extensions: ExtensionSet,
    max_depth: usize,
}

impl Scanner {
    pub fn new(extensions: ExtensionSet) -> Self {
        Self {
            extensions,
            max_depth: DEFAULT_MAX_SCAN_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// Start a lazy walk of `root`.
    ///
    /// Fails up front if `root` is missing or not a directory. Unreadable
    /// entries found during the walk are logged and skipped.
    pub fn scan(&self, root: &Path) -> Result<ScanIter, ScanError> {
        let metadata = std::fs::metadata(root).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ScanError::NotFound(root.to_path_buf())
            } else {
                ScanError::Io {
                    path: root.to_path_buf(),
                    source,
                }
            }
        })?;

        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let walker = WalkDir::new(root)
            .follow_links(true)
            .max_depth(self.max_depth)
            .into_iter();

        Ok(ScanIter {
            root: root.to_path_buf(),
            walker,
            extensions: self.extensions.clone(),
            cancel: None,
        })
    }

    /// Collect every image key under `root`.
    pub fn collect(&self, root: &Path) -> Result<HashSet<String>, ScanError> {
        Ok(self.scan(root)?.collect())
    }
}

/// Lazy sequence of image keys produced by [`Scanner::scan`].
pub struct ScanIter {
    root: PathBuf,
    walker: walkdir::IntoIter,
    extensions: ExtensionSet,
    cancel: Option<Arc<AtomicBool>>,
}

impl ScanIter {
    /// Stop yielding once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

impl Iterator for ScanIter {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if self.cancelled() {
                return None;
            }

            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    if e.loop_ancestor().is_some() {
                        tracing::warn!(path = ?e.path(), "Skipping symlink cycle");
                    } else {
                        tracing::warn!(error = %e, "Skipping unreadable entry");
                    }
                    continue;
                },
            };

            if !entry.file_type().is_file() || !self.extensions.matches(entry.path()) {
                continue;
            }

            match relative_key(&self.root, entry.path()) {
                Some(key) => return Some(key),
                None => {
                    tracing::warn!(path = ?entry.path(), "Skipping file with non UTF-8 name");
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"img").unwrap();
    }

    fn scanner(extensions: &[&str]) -> Scanner {
        Scanner::new(ExtensionSet::new(extensions.iter().copied()).unwrap())
    }

    #[test]
    fn test_scan_filters_by_extension_case_insensitively() {
        let dir = TempDir::new().unwrap();
        for file in ["a.jpg", "b.JPG", "c.txt", "sub/d.png"] {
            touch(dir.path(), file);
        }

        let found = scanner(&[".jpg", ".png"]).collect(dir.path()).unwrap();
        let expected: HashSet<String> = ["a.jpg", "b.JPG", "sub/d.png"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_scan_skips_directories_named_like_images() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("album.jpg")).unwrap();
        touch(dir.path(), "album.jpg/inner.jpg");

        let found = scanner(&[".jpg"]).collect(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains("album.jpg/inner.jpg"));
    }

    #[test]
    fn test_scan_respects_max_depth() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "top.jpg");
        touch(dir.path(), "a/b/c/deep.jpg");

        let found = scanner(&[".jpg"])
            .with_max_depth(2)
            .collect(dir.path())
            .unwrap();
        assert!(found.contains("top.jpg"));
        assert!(!found.contains("a/b/c/deep.jpg"));
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            scanner(&[".jpg"]).scan(&missing),
            Err(ScanError::NotFound(_))
        ));
    }

    #[test]
    fn test_scan_root_is_file() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.jpg");
        assert!(matches!(
            scanner(&[".jpg"]).scan(&dir.path().join("a.jpg")),
            Err(ScanError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_cancelled_scan_stops() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "b.jpg");

        let flag = Arc::new(AtomicBool::new(true));
        let found: Vec<String> = scanner(&[".jpg"])
            .scan(dir.path())
            .unwrap()
            .with_cancel(flag)
            .collect();
        assert!(found.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_terminates_on_symlink_cycle() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "sub/a.jpg");
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();

        let found = scanner(&[".jpg"]).collect(dir.path()).unwrap();
        assert!(found.contains("sub/a.jpg"));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_follows_file_symlinks() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        touch(outside.path(), "real.png");
        std::os::unix::fs::symlink(outside.path().join("real.png"), dir.path().join("link.png"))
            .unwrap();

        let found = scanner(&[".png"]).collect(dir.path()).unwrap();
        assert!(found.contains("link.png"));
    }
}
