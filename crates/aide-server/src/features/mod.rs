//! Feature modules implementing the AIDE data-administration API
//!
//! Each feature is a vertical slice with its own commands, queries, and
//! routes, following the CQRS (Command Query Responsibility Segregation)
//! pattern.
//!
//! # Features
//!
//! - **images**: inventory reconciliation for a project's image folder
//!   (scan, add existing, remove, range listing) and the supported-format
//!   allow-lists
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations (add existing images, remove images)
//! - `queries/` - Read operations (list, scan, formats)
//! - `routes.rs` - HTTP route definitions
//!
//! Commands and queries implement the mediator pattern using the `mediator` crate,
//! so the same handlers serve both the HTTP routes and the `import-images` CLI.

pub mod images;
pub mod shared;

use axum::Router;
use std::sync::Arc;

use crate::auth::AccessControl;
use crate::db::ImageStore;
use crate::inventory::InventorySettings;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Per-project image registry
    pub store: Arc<dyn ImageStore>,
    /// Admin check run before any image route
    pub access: Arc<dyn AccessControl>,
    /// File-server root, allow-lists, limits and timeouts
    pub settings: Arc<InventorySettings>,
}

/// Creates the API router with all feature routes mounted
///
/// - `/projects/:project/images` - Inventory administration (admin only)
/// - `/formats` - Supported image extensions and MIME types (public)
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/projects/:project/images", images::images_routes())
        .nest("/formats", images::formats_routes())
        .with_state(state)
}
