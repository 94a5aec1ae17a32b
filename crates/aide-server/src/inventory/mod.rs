//! Inventory reconciliation core
//!
//! - [`scanner`]: lazy discovery of image files under a project root
//! - [`differ`]: disk/database set comparison
//! - [`range_query`]: validated, bounded inventory listings
//! - [`paths`]: the project-relative key format shared by all of the above
//!
//! Ingestion and removal are feature commands built on these pieces; see
//! `features::images`.

pub mod differ;
pub mod paths;
pub mod range_query;
pub mod scanner;

use aide_common::media::MimeTypeSet;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::ProjectName;

pub use differ::{diff, InventoryDiff};
pub use range_query::{ImageQueryPlan, QueryBuildError, QueryLimits, RangeQueryParams};
pub use scanner::{ScanError, Scanner};

/// Runtime settings shared by the inventory features.
#[derive(Debug, Clone)]
pub struct InventorySettings {
    pub files_root: PathBuf,
    pub scanner: Scanner,
    pub mime_types: MimeTypeSet,
    pub scan_timeout: Duration,
    pub query_limits: QueryLimits,
    pub query_timeout: Duration,
}

impl InventorySettings {
    pub fn from_config(config: &Config) -> aide_common::Result<Self> {
        Ok(Self {
            files_root: config.files.root.clone(),
            scanner: Scanner::new(config.image_extensions()?)
                .with_max_depth(config.files.max_scan_depth),
            mime_types: config.image_mime_types()?,
            scan_timeout: Duration::from_secs(config.files.scan_timeout_secs),
            query_limits: QueryLimits {
                default_limit: config.inventory.list_default_limit,
                max_limit: config.inventory.list_max_limit,
            },
            query_timeout: Duration::from_secs(config.inventory.query_timeout_secs),
        })
    }

    /// Image root of `project` on the file server.
    pub fn project_root(&self, project: &ProjectName) -> PathBuf {
        self.files_root.join(project.as_str())
    }

    /// Scan `project`'s image root on the blocking pool.
    ///
    /// The walk is abandoned once `scan_timeout` elapses; a scan is read-only
    /// so nothing needs undoing.
    #[tracing::instrument(skip(self), fields(project = %project))]
    pub async fn scan_project(&self, project: &ProjectName) -> Result<HashSet<String>, ScanError> {
        let root = self.project_root(project);
        let scanner = self.scanner.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let task_cancel = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            scanner
                .scan(&root)
                .map(|keys| keys.with_cancel(task_cancel).collect::<HashSet<String>>())
        });

        match tokio::time::timeout(self.scan_timeout, task).await {
            Ok(Ok(result)) => {
                if let Ok(keys) = &result {
                    tracing::debug!(found = keys.len(), "Scan finished");
                }
                result
            },
            Ok(Err(join_error)) => Err(ScanError::Aborted(join_error.to_string())),
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                tracing::warn!(timeout = ?self.scan_timeout, "Scan timed out");
                Err(ScanError::TimedOut(self.scan_timeout))
            },
        }
    }
}
