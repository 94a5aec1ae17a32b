//! Image inventory persistence
//!
//! [`ImageStore`] is the seam between the inventory features and the
//! per-project tables. Production uses [`super::postgres::PgImageStore`];
//! tests use an in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::project::ProjectName;
use super::DbResult;
use crate::inventory::range_query::ImageQueryPlan;

/// One registered image together with its derived usage statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImageSummary {
    pub id: Uuid,
    pub filename: String,
    pub date_added: DateTime<Utc>,
    /// Most recent view by any user; `None` if nobody has viewed the image.
    pub last_viewed: Option<DateTime<Utc>>,
    /// Total views across all users.
    pub viewcount: i64,
    #[serde(rename = "num_anno")]
    #[sqlx(rename = "num_anno")]
    pub num_annotations: i64,
    #[serde(rename = "num_pred")]
    #[sqlx(rename = "num_pred")]
    pub num_predictions: i64,
}

/// What happened to one image id in a removal batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemovalStatus {
    /// The record and its dependents were deleted.
    Removed { filename: String },
    /// Annotations or predictions exist and removal was not forced.
    Blocked { annotations: i64, predictions: i64 },
    /// No image with this id is registered.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalOutcome {
    pub id: Uuid,
    #[serde(flatten)]
    pub status: RemovalStatus,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn project_exists(&self, project: &ProjectName) -> DbResult<bool>;

    /// Filenames of every registered image, as stored.
    async fn registered_filenames(&self, project: &ProjectName) -> DbResult<HashSet<String>>;

    /// Register `filenames` in one transaction. Names that became registered
    /// concurrently are skipped rather than failing the batch; the returned
    /// list holds only the names this call actually inserted. Any other
    /// failure leaves the inventory unchanged.
    async fn insert_images(&self, project: &ProjectName, filenames: &[String])
        -> DbResult<Vec<String>>;

    /// Remove the given images in one transaction.
    ///
    /// An image with annotations or predictions is only removed when `force`
    /// is set, in which case those rows go with it. Per-user view rows are
    /// always deleted together with the image. On error nothing is removed.
    async fn remove_images(
        &self,
        project: &ProjectName,
        ids: &[Uuid],
        force: bool,
    ) -> DbResult<Vec<RemovalOutcome>>;

    /// Registered images matching `plan`, ordered and limited by it.
    async fn list_images(
        &self,
        project: &ProjectName,
        plan: &ImageQueryPlan,
    ) -> DbResult<Vec<ImageSummary>>;
}
