//! AIDE Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the AIDE data
//! administration workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`AideError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Media**: the deployment-wide image extension and MIME allow-lists
//!
//! # Example
//!
//! ```no_run
//! use aide_common::media::ExtensionSet;
//! use std::path::Path;
//!
//! let extensions = ExtensionSet::default();
//! assert!(extensions.matches(Path::new("survey/IMG_0001.JPG")));
//! ```

pub mod error;
pub mod logging;
pub mod media;

// Re-export commonly used types
pub use error::{AideError, Result};
