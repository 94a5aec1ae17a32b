//! Image media allow-lists
//!
//! The file server only ever treats files as images when their extension is
//! in a deployment-wide allow-list. Matching is case-insensitive, so
//! `IMG_0001.JPG` and `img_0001.jpg` are both images when `.jpg` is allowed.
//!
//! The defaults mirror what the annotation UI can render; deployments may
//! override them through configuration.

use crate::error::{AideError, Result};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::path::Path;

/// Extensions accepted as images when no override is configured.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".tif", ".tiff", ".bmp", ".ico", ".jfif", ".pjpeg", ".pjp",
];

/// MIME types accepted for image uploads when no override is configured.
pub const DEFAULT_IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/bmp",
    "image/x-windows-bmp",
    "image/gif",
    "image/x-icon",
    "image/png",
    "image/tiff",
];

/// Case-insensitive set of file extensions, stored as `.ext` in lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: BTreeSet<String>,
}

impl ExtensionSet {
    /// Build a set from raw extensions (`"jpg"`, `".JPG"` and `" .jpg "` are equivalent).
    pub fn new<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = items
            .into_iter()
            .map(|item| normalize_extension(item.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;

        if extensions.is_empty() {
            return Err(AideError::Config(
                "image extension allow-list cannot be empty".to_string(),
            ));
        }

        Ok(Self { extensions })
    }

    /// Parse a comma-separated list such as `".jpg,.png,tif"`.
    pub fn parse_list(list: &str) -> Result<Self> {
        Self::new(list.split(',').filter(|s| !s.trim().is_empty()))
    }

    /// Whether `ext` (with or without the leading dot) is allowed.
    pub fn contains(&self, ext: &str) -> bool {
        normalize_extension(ext)
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false)
    }

    /// Whether the file at `path` has an allowed extension.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.contains(ext))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for ExtensionSet {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl Serialize for ExtensionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Set of `type/subtype` MIME strings, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeTypeSet {
    types: BTreeSet<String>,
}

impl MimeTypeSet {
    pub fn new<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let types = items
            .into_iter()
            .map(|item| normalize_mime_type(item.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;

        if types.is_empty() {
            return Err(AideError::Config(
                "image MIME type allow-list cannot be empty".to_string(),
            ));
        }

        Ok(Self { types })
    }

    pub fn parse_list(list: &str) -> Result<Self> {
        Self::new(list.split(',').filter(|s| !s.trim().is_empty()))
    }

    pub fn contains(&self, mime: &str) -> bool {
        self.types.contains(&mime.trim().to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }
}

impl Default for MimeTypeSet {
    fn default() -> Self {
        Self {
            types: DEFAULT_IMAGE_MIME_TYPES
                .iter()
                .map(|mime| mime.to_string())
                .collect(),
        }
    }
}

impl Serialize for MimeTypeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

fn normalize_extension(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('.').unwrap_or(trimmed);

    let valid = !bare.is_empty()
        && bare
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(AideError::InvalidExtension(raw.to_string()));
    }

    Ok(format!(".{}", bare.to_ascii_lowercase()))
}

fn normalize_mime_type(raw: &str) -> Result<String> {
    let mime = raw.trim().to_ascii_lowercase();
    match mime.split_once('/') {
        Some((kind, subtype))
            if !kind.is_empty() && !subtype.is_empty() && !subtype.contains('/') =>
        {
            Ok(mime)
        },
        _ => Err(AideError::InvalidMimeType(raw.to_string())),
    }
}
