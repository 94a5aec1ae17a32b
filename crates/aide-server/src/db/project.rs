//! Validated project identifiers
//!
//! Every project owns a PostgreSQL schema named after its short name, so the
//! short name is the one caller-supplied value that ends up in SQL as an
//! identifier. [`ProjectName`] is the only way to get it there: it can only
//! be constructed from a string matching [`PROJECT_NAME_PATTERN`], and it
//! renders itself double-quoted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// Lowercase letters, digits, `_` and `-`; must start with a letter or digit;
/// at most 63 bytes (the PostgreSQL identifier limit).
pub const PROJECT_NAME_PATTERN: &str = r"^[a-z0-9][a-z0-9_-]{0,62}$";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectNameError {
    #[error("Project name is required and cannot be empty")]
    Required,

    #[error("Project name '{0}' may only contain lowercase letters, digits, '_' and '-' (at most 63 characters)")]
    InvalidFormat(String),
}

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(PROJECT_NAME_PATTERN).expect("project name pattern is valid")
    })
}

/// A project short name that is safe to use as a schema identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    pub fn parse(raw: &str) -> Result<Self, ProjectNameError> {
        if raw.is_empty() {
            return Err(ProjectNameError::Required);
        }
        if !pattern().is_match(raw) {
            return Err(ProjectNameError::InvalidFormat(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The schema identifier, double-quoted for direct use in SQL text.
    pub fn schema(&self) -> String {
        // The pattern excludes '"', so no escaping is needed.
        format!("\"{}\"", self.0)
    }

    /// A schema-qualified, quoted table reference such as `"wildlife"."image"`.
    pub fn table(&self, table: ProjectTable) -> String {
        format!("{}.\"{}\"", self.schema(), table.as_str())
    }
}

impl TryFrom<String> for ProjectName {
    type Error = ProjectNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectName> for String {
    fn from(value: ProjectName) -> Self {
        value.0
    }
}

impl std::fmt::Display for ProjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The per-project tables this service reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectTable {
    Image,
    ImageUser,
    Annotation,
    Prediction,
}

impl ProjectTable {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectTable::Image => "image",
            ProjectTable::ImageUser => "image_user",
            ProjectTable::Annotation => "annotation",
            ProjectTable::Prediction => "prediction",
        }
    }
}
