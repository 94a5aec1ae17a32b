//! Project-relative image keys
//!
//! Stored filenames are `/`-separated paths relative to the project's image
//! root, with no leading separator and no `.`/`..` segments. The same form
//! is produced by the scanner, so disk and database keys compare directly.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidName {
    #[error("Filename is empty")]
    Empty,

    #[error("Filename '{0}' must be relative to the project folder")]
    Absolute(String),

    #[error("Filename '{0}' may not contain '..' segments")]
    Traversal(String),

    #[error("Filename '{0}' is not a normalized relative path")]
    NotNormalized(String),
}

/// Check that `name` is a normalized project-relative key.
pub fn validate_name(name: &str) -> Result<(), InvalidName> {
    if name.trim().is_empty() {
        return Err(InvalidName::Empty);
    }

    if name.starts_with('/') || name.starts_with('\\') || has_drive_prefix(name) {
        return Err(InvalidName::Absolute(name.to_string()));
    }

    let segments: Vec<&str> = name.split(['/', '\\']).collect();
    if segments.iter().any(|segment| *segment == "..") {
        return Err(InvalidName::Traversal(name.to_string()));
    }
    if name.contains('\\')
        || name.contains('\0')
        || segments.iter().any(|segment| segment.is_empty() || *segment == ".")
    {
        return Err(InvalidName::NotNormalized(name.to_string()));
    }

    Ok(())
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Location of `name` under `root`, after validating the name.
pub fn resolve(root: &Path, name: &str) -> Result<PathBuf, InvalidName> {
    validate_name(name)?;
    Ok(root.join(name))
}

/// Render a path below `root` as a stored key. Returns `None` if the path is
/// outside `root` or not valid UTF-8.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            _ => return None,
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["a.jpg", "sub/d.png", "deep/er/IMG 0001.JPG", "..hidden.jpg"] {
            assert_eq!(validate_name(name), Ok(()), "{} should be valid", name);
        }
    }

    #[test]
    fn test_rejected_names() {
        assert_eq!(validate_name(""), Err(InvalidName::Empty));
        assert_eq!(validate_name("  "), Err(InvalidName::Empty));
        assert!(matches!(validate_name("/etc/passwd"), Err(InvalidName::Absolute(_))));
        assert!(matches!(validate_name("C:\\img.jpg"), Err(InvalidName::Absolute(_))));
        assert!(matches!(validate_name("../etc/passwd"), Err(InvalidName::Traversal(_))));
        assert!(matches!(validate_name("a/../../b.jpg"), Err(InvalidName::Traversal(_))));
        assert!(matches!(validate_name("a//b.jpg"), Err(InvalidName::NotNormalized(_))));
        assert!(matches!(validate_name("./a.jpg"), Err(InvalidName::NotNormalized(_))));
        assert!(matches!(validate_name("dir/"), Err(InvalidName::NotNormalized(_))));
    }

    #[test]
    fn test_resolve_stays_under_root() {
        let root = Path::new("/srv/files/wildlife");
        assert_eq!(
            resolve(root, "sub/a.jpg").unwrap(),
            PathBuf::from("/srv/files/wildlife/sub/a.jpg")
        );
        assert!(resolve(root, "../other/a.jpg").is_err());
    }

    #[test]
    fn test_relative_key() {
        let root = Path::new("/srv/files/wildlife");
        assert_eq!(
            relative_key(root, Path::new("/srv/files/wildlife/sub/d.png")),
            Some("sub/d.png".to_string())
        );
        assert_eq!(relative_key(root, Path::new("/srv/files/other/a.jpg")), None);
        assert_eq!(relative_key(root, root), None);
    }
}
