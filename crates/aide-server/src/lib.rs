//! AIDE Server Library
//!
//! Data administration for AIDE image-annotation projects: keeps each
//! project's image registry consistent with the image files on the file
//! server.
//!
//! # Overview
//!
//! - **Inventory**: filesystem scanner, disk/database differ, and a
//!   validated range query builder for listings
//! - **Features**: add existing images, remove images, scan, list, and the
//!   supported-format allow-lists
//! - **Database**: per-project PostgreSQL schemas accessed through SQLx
//! - **Access control**: admin checks run before any image route
//! - **Configuration**: environment-based configuration management
//!
//! # Architecture
//!
//! The server follows a **CQRS (Command Query Responsibility Segregation)** architecture:
//!
//! - **Commands** (write operations) register or remove images, and are
//!   the only requests that open storage transactions
//!   - Examples: add existing images, remove images
//! - **Queries** (read operations) never change state
//!   - Examples: scan for images, list images by range, supported formats
//!
//! Per-item outcomes (a duplicate filename, an image blocked by its
//! annotations) are returned as data; only whole-call failures become
//! errors.
//!
//! ## Framework Stack
//!
//! - **Axum**: HTTP routing and extraction
//! - **SQLx**: PostgreSQL access with runtime-built queries
//! - **Tower**: Middleware and service abstractions
//! - **walkdir**: bounded directory traversal
//!
//! # Example
//!
//! ```no_run
//! use aide_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     api::serve(config).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod cqrs;
pub mod db;
pub mod error;
pub mod features;
pub mod inventory;
pub mod middleware;

// Re-export commonly used types
pub use error::{ApiResult, AppError, ErrorCode};
